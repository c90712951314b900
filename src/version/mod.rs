//! Version table lookups.
//!
//! The version table maps upstream repositories (and individual components
//! inside them) to source-version identifiers, usually commit SHAs:
//!
//! ```yaml
//! versions:
//!   org/app: 4f1c2b9e0d8a7c6b5a4f3e2d1c0b9a8f7e6d5c4b   # repository-wide
//!   org/lambdas#bot_admin: 9a8f7e6d5c4b...               # component, new format
//!   bot_admin: 1111aaaa...                               # component, legacy format
//! ```
//!
//! Bare repository lookups are shortened to the first seven characters.
//! Component lookups (`repo#component`) return the stored identifier as is:
//! the exact compound key first, then the legacy component-only key.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::parse_config;
use crate::constants::SHORT_VERSION_LEN;
use crate::core::DeployError;

#[derive(Debug, Deserialize)]
struct VersionsFile {
    #[serde(default)]
    versions: BTreeMap<String, String>,
}

/// Repository/component → identifier mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTable {
    versions: BTreeMap<String, String>,
}

impl VersionTable {
    /// Create a table from raw entries.
    pub fn new(versions: BTreeMap<String, String>) -> Self {
        Self {
            versions,
        }
    }

    /// Load the `versions` mapping of a YAML versions file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DeployError::VersionsFileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let file: VersionsFile = parse_config(path)
            .with_context(|| format!("Failed to load versions file {}", path.display()))?;
        tracing::debug!("Loaded {} versions from {}", file.versions.len(), path.display());

        Ok(Self::new(file.versions))
    }

    /// Raw identifier lookup, without shortening.
    ///
    /// `repo#component` tries the exact key, then the component-only key.
    /// Anything else is an exact lookup.
    pub fn lookup(&self, id: &str) -> Option<&str> {
        if let Some(value) = self.versions.get(id) {
            return Some(value);
        }
        let (_, component) = id.rsplit_once('#')?;
        self.versions.get(component).map(String::as_str)
    }

    /// Resolve an identifier the way globals do.
    ///
    /// Bare repositories yield the short identifier, components the full one.
    pub fn resolve(&self, id: &str) -> Option<String> {
        let value = self.lookup(id)?;
        if id.contains('#') {
            Some(value.to_string())
        } else {
            Some(short_version(value).to_string())
        }
    }

    /// Every key in the table, sorted.
    pub fn known_keys(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// First seven characters of an identifier (or all of it if shorter).
pub fn short_version(value: &str) -> &str {
    match value.char_indices().nth(SHORT_VERSION_LEN) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
