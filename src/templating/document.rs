//! Template documents.
//!
//! Templates are CloudFormation-style YAML. Only two things are read from
//! them: the keys of the top-level `Parameters` mapping and the raw body,
//! which is shipped verbatim and fingerprinted with SHA-256. Custom tags
//! such as `!Ref` or `!GetAtt` parse as tagged values and are ignored.

use anyhow::{Context, Result};
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::value_type_name;
use crate::core::DeployError;

/// A parsed template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    /// Where the template was read from
    pub path: PathBuf,
    /// Raw template text
    pub body: String,
    /// Names declared under `Parameters`
    pub parameters: BTreeSet<String>,
}

impl TemplateDocument {
    /// Read and parse a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file {}", path.display()))?;
        Self::parse(path, body)
    }

    /// Parse template text read from `path`.
    ///
    /// Fails when the text is not YAML, is empty or comment-only, or is not a
    /// mapping at the top level.
    pub fn parse(path: &Path, body: String) -> Result<Self> {
        let invalid = |reason: String| DeployError::InvalidTemplate {
            file: path.display().to_string(),
            reason,
        };

        let empty = || {
            invalid(
                "the file is empty or contains only comments; a template needs at least a Resources section"
                    .to_string(),
            )
        };
        if body.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
            return Err(empty().into());
        }

        let content: Value = serde_yaml::from_str(&body).map_err(|e| invalid(e.to_string()))?;

        let mapping = match content {
            Value::Null => return Err(empty().into()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(invalid(format!(
                    "expected a mapping at the top level but got a {}",
                    value_type_name(&other)
                ))
                .into());
            }
        };

        let parameters = match mapping.get("Parameters") {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Mapping(params)) => {
                params.keys().filter_map(|k| k.as_str().map(ToString::to_string)).collect()
            }
            Some(other) => {
                return Err(invalid(format!(
                    "Parameters must be a mapping but is a {}",
                    value_type_name(other)
                ))
                .into());
            }
        };

        tracing::debug!("Parameters required from template {}: {parameters:?}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            body,
            parameters,
        })
    }

    /// SHA-256 of the raw body, lowercase hex.
    pub fn content_hash(&self) -> String {
        content_hash(&self.body)
    }
}

/// SHA-256 of `body`, lowercase hex.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
