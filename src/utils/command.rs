//! Builder for external commands (`aws`, `cfn-lint`).
//!
//! Commands run through `tokio::process` with captured output and a timeout.
//! A non-zero exit status is not an error for [`ExternalCommand::execute`];
//! callers that need success use [`ExternalCommand::execute_success`].

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::COMMAND_TIMEOUT;
use crate::core::DeployError;

/// Fluent builder for one external command invocation.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: OsString,
    args: Vec<String>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

/// Captured result of an [`ExternalCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Whether the process exited with status 0
    pub success: bool,
    /// Exit code, if the process was not killed by a signal
    pub code: Option<i32>,
}

impl ExternalCommand {
    /// Command for `program` with the default timeout.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
            timeout_duration: Some(COMMAND_TIMEOUT),
            context: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Override the timeout; `None` waits forever.
    pub const fn timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label used in log lines, usually the stack name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Rendered command line for messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run the command and capture its output.
    ///
    /// Fails only when the process cannot be spawned or exceeds the timeout.
    pub async fn execute(self) -> Result<CommandOutput> {
        let start = std::time::Instant::now();
        let command_line = self.command_line();
        let label = self.context.as_deref().unwrap_or("-");

        tracing::debug!(target: "command", "({label}) Executing command: {command_line}");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result.with_context(|| format!("Failed to execute {command_line}"))?,
                Err(_) => {
                    tracing::warn!(
                        target: "command",
                        "({label}) Command timed out after {} seconds: {command_line}",
                        duration.as_secs()
                    );
                    return Err(DeployError::CommandFailed {
                        command: command_line,
                        stderr: format!("timed out after {} seconds", duration.as_secs()),
                    }
                    .into());
                }
            },
            None => output_future.await.with_context(|| format!("Failed to execute {command_line}"))?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "command",
                "({label}) Command failed with exit code: {:?}",
                output.status.code()
            );
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(target: "command", "({label}) {}", stderr.trim());
        }
        tracing::debug!(
            target: "command::perf",
            "({label}) {command_line} took {}ms",
            start.elapsed().as_millis()
        );

        Ok(CommandOutput {
            stdout,
            stderr,
            success: output.status.success(),
            code: output.status.code(),
        })
    }

    /// Run the command and fail with [`DeployError::CommandFailed`] on a
    /// non-zero exit status.
    pub async fn execute_success(self) -> Result<CommandOutput> {
        let command_line = self.command_line();
        let output = self.execute().await?;
        if !output.success {
            return Err(DeployError::CommandFailed {
                command: command_line,
                stderr: if output.stderr.trim().is_empty() {
                    output.stdout.trim().to_string()
                } else {
                    output.stderr.trim().to_string()
                },
            }
            .into());
        }
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_rendering() {
        let cmd = ExternalCommand::new("aws").args(["lambda", "invoke"]).arg("--region").arg("eu");
        assert_eq!(cmd.command_line(), "aws lambda invoke --region eu");
    }

    #[tokio::test]
    async fn test_execute_captures_output() {
        let output = ExternalCommand::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .execute()
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
    }

    #[tokio::test]
    async fn test_execute_success_maps_failure() {
        let err = ExternalCommand::new("sh")
            .args(["-c", "echo boom >&2; exit 1"])
            .execute_success()
            .await
            .unwrap_err();
        match err.downcast_ref::<DeployError>() {
            Some(DeployError::CommandFailed { command, stderr }) => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(stderr, "boom");
            }
            other => panic!("Expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = ExternalCommand::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Some(Duration::from_millis(50)))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Command failed"));
    }

    #[tokio::test]
    async fn test_env_vars_are_passed() {
        let output = ExternalCommand::new("sh")
            .args(["-c", "printf %s \"$DEPLOY_TEST_VAR\""])
            .env("DEPLOY_TEST_VAR", "value")
            .execute_success()
            .await
            .unwrap();
        assert_eq!(output.stdout, "value");
    }
}
