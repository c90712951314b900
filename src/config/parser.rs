//! Generic configuration file parsing.
//!
//! Parses YAML (`.yaml`/`.yml`) or JSON (`.json`) files into any
//! `DeserializeOwned` type. YAML syntax errors are reported with the lines
//! around the failure so the offending construct is visible without opening
//! the file.
//!
//! Example error output:
//! ```text
//! Invalid configuration syntax in devops/stacks.yaml
//! stacks[0].parameters: invalid type ... at line 7 column 9
//!
//! Context around line 7:
//!        5: stacks:
//!        6:   - stack_name: api
//!    >>> 7:     parameters: [
//! ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::constants::ERROR_CONTEXT_LINES;
use crate::core::DeployError;

/// Configuration file formats understood by [`parse_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML document (JSON documents are accepted too)
    Yaml,
    /// Strict JSON
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension; anything but `.json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Read and parse a configuration file.
///
/// Returns [`DeployError::ConfigNotFound`] when the file does not exist and
/// [`DeployError::ConfigParseError`] on syntax or schema errors.
pub fn parse_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(DeployError::ConfigNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content, ConfigFormat::from_path(path), &path.display().to_string())
}

/// Parse configuration content that was already read.
///
/// `origin` is only used in error messages.
pub fn parse_config_str<T: DeserializeOwned>(
    content: &str,
    format: ConfigFormat,
    origin: &str,
) -> Result<T> {
    let parsed = match format {
        ConfigFormat::Json => serde_json::from_str::<T>(content).map_err(|e| {
            let reason = if e.line() > 0 {
                format!("{e}\n\n{}", render_context(content, e.line()))
            } else {
                e.to_string()
            };
            DeployError::ConfigParseError {
                file: origin.to_string(),
                reason,
            }
        })?,
        ConfigFormat::Yaml => serde_yaml::from_str::<T>(content).map_err(|e| {
            let reason = match e.location() {
                Some(location) => {
                    format!("{e}\n\n{}", render_context(content, location.line()))
                }
                None => e.to_string(),
            };
            DeployError::ConfigParseError {
                file: origin.to_string(),
                reason,
            }
        })?,
    };

    tracing::info!("Loaded config file {origin}");
    Ok(parsed)
}

/// Render the lines around `line` (1-indexed) with a `>>>` marker.
fn render_context(content: &str, line: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let error_idx = line.saturating_sub(1);
    let start = error_idx.saturating_sub(ERROR_CONTEXT_LINES);
    let end = (error_idx + ERROR_CONTEXT_LINES).min(lines.len());

    let mut out = format!("Context around line {line}:\n");
    for (idx, text) in lines.iter().enumerate().take(end).skip(start) {
        let indicator = if idx == error_idx {
            ">>>"
        } else {
            "   "
        };
        out.push_str(&format!("{indicator} {:>4}: {}\n", idx + 1, text.trim_end()));
    }
    out
}
