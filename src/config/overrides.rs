//! Override globals file.
//!
//! A flat text file of `key=value` lines. Blank lines and lines starting with
//! `#` are ignored; keys and values are trimmed. Overrides replace configured
//! globals and have the highest precedence.

use anyhow::{Context, Result};
use std::path::Path;

use crate::core::DeployError;

/// Load `key=value` overrides in file order.
pub fn load_override_globals(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        return Err(DeployError::ConfigNotFound {
            path: path.display().to_string(),
        })
        .with_context(|| format!("Override globals file {} not found", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read override globals file {}", path.display()))?;

    parse_override_globals(&content, &path.display().to_string())
}

/// Parse override lines; `origin` is used in error messages.
pub fn parse_override_globals(content: &str, origin: &str) -> Result<Vec<(String, String)>> {
    let mut overrides = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.trim().split_once('=') else {
            return Err(DeployError::ConfigParseError {
                file: origin.to_string(),
                reason: format!("line {} is not of the form key=value: {line}", idx + 1),
            }
            .into());
        };
        overrides.push((key.trim().to_string(), value.trim().to_string()));
    }

    Ok(overrides)
}
