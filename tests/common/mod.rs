//! Common helpers for the stack-deployer integration tests

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::path::{Path, PathBuf};

use stack_deployer::config::DeploymentConfig;
use stack_deployer::resolver::{DeploymentPlan, prepare_plan_at};
use stack_deployer::test_utils::TestLayout;

/// Fixed run timestamp so parameters are deterministic.
pub const TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Captured output of a CLI run.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// A [`TestLayout`] plus CLI and planning shortcuts.
pub struct TestProject {
    pub layout: TestLayout,
}

impl TestProject {
    /// Empty project for `environment`.
    pub fn new(environment: &str) -> Result<Self> {
        Ok(Self {
            layout: TestLayout::new(environment)?,
        })
    }

    /// Three stacks in a chain: `frontend` → `backend` → `network`.
    pub fn chain(environment: &str) -> Result<Self> {
        let project = Self::new(environment)?;
        project.layout.write_template("devops", "network.yaml", &["Environment", "VpcCidr"])?;
        project.layout.write_template("devops", "backend.yaml", &["Environment", "ImageTag"])?;
        project.layout.write_template("devops", "frontend.yaml", &["Environment", "BucketName"])?;
        project.layout.write_versions(&[("org/backend", "0123456789abcdef")])?;
        project.layout.write_config(&format!(
            r#"
environment: {environment}
repo_versions_file: ../versions.yaml
globals:
  VpcCidr: 10.0.0.0/16
  ImageTag: {{ $version: org/backend }}
  BucketName: {{ $sub: "assets-${{Environment}}" }}
stacks:
  - stack_name: frontend
    dependencies: [backend]
  - stack_name: backend
    dependencies: [network]
  - stack_name: network
"#
        ))?;
        Ok(project)
    }

    /// Path of the config file.
    pub fn config_path(&self) -> PathBuf {
        self.layout.config_path()
    }

    /// Load the config file.
    pub fn config(&self) -> Result<DeploymentConfig> {
        self.layout.load_config()
    }

    /// Load the config and build the plan at [`TEST_TIMESTAMP`].
    pub fn plan(&self) -> Result<DeploymentPlan> {
        prepare_plan_at(&self.config()?, TEST_TIMESTAMP)
    }

    /// Run the binary with `args` inside the project root.
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        run_deployer(self.layout.root(), args, &[])
    }

    /// Run the binary with extra environment variables.
    pub fn run_with_env(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<CommandOutput> {
        run_deployer(self.layout.root(), args, envs)
    }
}

/// Run the `stack-deployer` binary.
pub fn run_deployer(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> Result<CommandOutput> {
    let mut cmd = Command::cargo_bin("stack-deployer").context("stack-deployer binary not built")?;
    cmd.args(args).current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let output = cmd.output().context("Failed to run stack-deployer")?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        code: output.status.code(),
    })
}
