//! Worker and status collaborators backed by the `aws` command line tool.
//!
//! The worker is a Lambda function invoked with `aws lambda invoke`; the
//! status source reads `Stacks[0].StackStatus` from
//! `aws cloudformation describe-stacks`. Both rely on the ambient AWS
//! credentials of the process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

use crate::core::DeployError;
use crate::deploy::{InvokeError, StackStatusSource, StackWorker, WorkerEnvelope, WorkerResponse};
use crate::utils::ExternalCommand;

/// Name of the AWS CLI executable.
pub const AWS_BINARY: &str = "aws";

/// Marker the CLI prints when Lambda throttles the invocation.
const RATE_LIMIT_MARKER: &str = "TooManyRequestsException";

/// Invocation metadata printed by `aws lambda invoke` on stdout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvokeMetadata {
    status_code: Option<u16>,
    function_error: Option<String>,
}

/// Invokes a Lambda function through `aws lambda invoke`.
#[derive(Debug, Clone)]
pub struct AwsCliWorker {
    function_name: String,
    region: String,
    binary: PathBuf,
}

impl AwsCliWorker {
    /// Worker for `function_name` in `region`.
    pub fn new(function_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            region: region.into(),
            binary: PathBuf::from(AWS_BINARY),
        }
    }

    /// Use a different `aws` executable.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn invoke_once(&self, stack_name: &str, envelope: &WorkerEnvelope) -> Result<WorkerResponse, InvokeError> {
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let request_path = scratch.path().join("request.json");
        let response_path = scratch.path().join("response.json");

        let payload = serde_json::to_vec(envelope).context("Failed to encode worker envelope")?;
        tokio::fs::write(&request_path, payload)
            .await
            .with_context(|| format!("Failed to write {}", request_path.display()))?;

        let output = ExternalCommand::new(self.binary.as_os_str())
            .args(["lambda", "invoke", "--function-name"])
            .arg(&self.function_name)
            .args(["--invocation-type", "RequestResponse"])
            .args(["--cli-binary-format", "raw-in-base64-out"])
            .arg("--payload")
            .arg(format!("fileb://{}", request_path.display()))
            .args(["--region", &self.region])
            .args(["--output", "json"])
            .arg(response_path.display().to_string())
            .with_context(stack_name)
            .execute()
            .await?;

        if !output.success {
            if output.stderr.contains(RATE_LIMIT_MARKER) {
                return Err(InvokeError::RateLimited(output.stderr.trim().to_string()));
            }
            return Err(InvokeError::Failed(
                DeployError::CommandFailed {
                    command: format!("aws lambda invoke --function-name {}", self.function_name),
                    stderr: output.stderr.trim().to_string(),
                }
                .into(),
            ));
        }

        let metadata: InvokeMetadata = serde_json::from_str(&output.stdout).with_context(|| {
            format!("Unreadable invocation metadata from aws lambda invoke: {}", output.stdout.trim())
        })?;
        let body = tokio::fs::read_to_string(&response_path)
            .await
            .with_context(|| format!("Failed to read {}", response_path.display()))?;

        if let Some(function_error) = metadata.function_error {
            return Err(InvokeError::Failed(anyhow::anyhow!(
                "worker raised {function_error} (status code {}): {}",
                metadata.status_code.unwrap_or_default(),
                body.trim()
            )));
        }

        Ok(WorkerResponse::from_body(&body))
    }
}

#[async_trait]
impl StackWorker for AwsCliWorker {
    fn worker_name(&self) -> &str {
        &self.function_name
    }

    async fn invoke(&self, stack_name: &str, envelope: &WorkerEnvelope) -> Result<WorkerResponse, InvokeError> {
        self.invoke_once(stack_name, envelope).await
    }
}

/// Reads stack status through `aws cloudformation describe-stacks`.
#[derive(Debug, Clone)]
pub struct AwsCliStatusSource {
    region: String,
    binary: PathBuf,
}

impl AwsCliStatusSource {
    /// Status source for `region`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            binary: PathBuf::from(AWS_BINARY),
        }
    }

    /// Use a different `aws` executable.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl StackStatusSource for AwsCliStatusSource {
    async fn stack_status(&self, stack_name: &str) -> Result<String> {
        let output = ExternalCommand::new(self.binary.as_os_str())
            .args(["cloudformation", "describe-stacks", "--stack-name", stack_name])
            .args(["--query", "Stacks[0].StackStatus", "--output", "text"])
            .args(["--region", &self.region])
            .with_context(stack_name)
            .execute_success()
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}
