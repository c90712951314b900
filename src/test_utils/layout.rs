//! Temporary environment trees.
//!
//! ```text
//! <tmp>/
//!   versions.yaml
//!   development/
//!   staging/
//!   production/
//!   devops/
//!     stacks.yaml      (config of the run environment)
//!     api.yaml
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::DeploymentConfig;
use crate::constants::ENVIRONMENT_PRIORITY;

/// Config file name written by [`TestLayout::write_config`].
pub const CONFIG_FILE: &str = "stacks.yaml";

/// Versions file name written by [`TestLayout::write_versions`].
pub const VERSIONS_FILE: &str = "versions.yaml";

/// Environment tree in a temporary directory.
pub struct TestLayout {
    temp_dir: TempDir,
    environment: String,
}

impl TestLayout {
    /// Create all tier directories plus one for `environment`.
    pub fn new(environment: &str) -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        for tier in ENVIRONMENT_PRIORITY.iter().copied().chain([environment]) {
            fs::create_dir_all(temp_dir.path().join(tier))?;
        }

        Ok(Self {
            temp_dir,
            environment: environment.to_string(),
        })
    }

    /// Root of the tree.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory of one tier.
    pub fn tier_dir(&self, tier: &str) -> PathBuf {
        self.root().join(tier)
    }

    /// Path of the run environment's config file.
    pub fn config_path(&self) -> PathBuf {
        self.tier_dir(&self.environment).join(CONFIG_FILE)
    }

    /// Write the config file of the run environment.
    pub fn write_config(&self, yaml: &str) -> Result<PathBuf> {
        let path = self.config_path();
        fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write a template into `tier` declaring `parameters` as String parameters.
    pub fn write_template(&self, tier: &str, file: &str, parameters: &[&str]) -> Result<PathBuf> {
        let mut body = String::from("AWSTemplateFormatVersion: '2010-09-09'\n");
        if !parameters.is_empty() {
            body.push_str("Parameters:\n");
            for parameter in parameters {
                body.push_str(&format!("  {parameter}:\n    Type: String\n"));
            }
        }
        body.push_str("Resources:\n  Topic:\n    Type: AWS::SNS::Topic\n    Properties:\n      TopicName: !Sub '${AWS::StackName}-topic'\n");
        self.write_raw_template(tier, file, &body)
    }

    /// Write a template with verbatim content.
    pub fn write_raw_template(&self, tier: &str, file: &str, content: &str) -> Result<PathBuf> {
        let path = self.tier_dir(tier).join(file);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write `versions.yaml` at the root with the given `(repository, version)` pairs.
    pub fn write_versions(&self, versions: &[(&str, &str)]) -> Result<PathBuf> {
        let mut body = String::from("versions:\n");
        for (repository, version) in versions {
            body.push_str(&format!("  {repository}: {version}\n"));
        }
        let path = self.root().join(VERSIONS_FILE);
        fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write an arbitrary file relative to the root.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Load the config file written by [`write_config`](Self::write_config).
    pub fn load_config(&self) -> Result<DeploymentConfig> {
        DeploymentConfig::load(&self.config_path())
    }
}
