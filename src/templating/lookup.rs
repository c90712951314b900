//! Environment-tiered template lookup.
//!
//! Environment directories are siblings of the directory holding the
//! configuration file:
//!
//! ```text
//! conf/
//! ├── development/
//! │   ├── stacks.yaml        <- configuration for the development run
//! │   └── api_service.yaml
//! ├── staging/
//! └── devops/
//!     └── network.yaml       <- shared by every tier above it
//! ```
//!
//! A lookup starts at the run environment's tier and walks towards the end of
//! [`ENVIRONMENT_PRIORITY`]; the first existing file wins. Every hit is
//! recorded in a [`TemplateSources`] accumulator owned by the caller.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::ENVIRONMENT_PRIORITY;
use crate::core::DeployError;

/// Searches template files across environment tiers.
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    root: PathBuf,
    tiers: Vec<String>,
}

/// A template file found by [`TemplateLocator::locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTemplate {
    /// Path of the file
    pub path: PathBuf,
    /// Tier the file was found in
    pub tier: String,
}

impl TemplateLocator {
    /// Locator for a configuration living in `config_dir`.
    ///
    /// An environment that is not a known tier only searches its own
    /// directory.
    pub fn new(config_dir: &Path, environment: &str) -> Self {
        let root = config_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let tiers = match ENVIRONMENT_PRIORITY.iter().position(|e| *e == environment) {
            Some(idx) => ENVIRONMENT_PRIORITY[idx..].iter().map(ToString::to_string).collect(),
            None => vec![environment.to_string()],
        };

        Self {
            root,
            tiers,
        }
    }

    /// Tiers searched, in order.
    pub fn tiers(&self) -> &[String] {
        &self.tiers
    }

    /// Find `file_name` in the first tier that has it.
    pub fn locate(&self, file_name: &str, sources: &mut TemplateSources) -> Result<LocatedTemplate> {
        let mut checked = Vec::with_capacity(self.tiers.len());

        for tier in &self.tiers {
            let candidate = self.root.join(tier).join(file_name);
            if candidate.is_file() {
                tracing::debug!("Found {file_name} in {tier}");
                sources.record(file_name, tier);
                return Ok(LocatedTemplate {
                    path: candidate,
                    tier: tier.clone(),
                });
            }
            checked.push(candidate.display().to_string());
        }

        Err(DeployError::TemplateNotFound {
            file: file_name.to_string(),
            environments: self.tiers.clone(),
            checked,
        }
        .into())
    }
}

/// Which tier each template file was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSources {
    files: BTreeMap<String, String>,
}

impl TemplateSources {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `file_name` was found in `tier`.
    pub fn record(&mut self, file_name: &str, tier: &str) {
        self.files.insert(file_name.to_string(), tier.to_string());
    }

    /// Tier of a recorded file.
    pub fn tier_of(&self, file_name: &str) -> Option<&str> {
        self.files.get(file_name).map(String::as_str)
    }

    /// Files grouped by tier, tiers in priority order, files sorted.
    pub fn by_tier(&self) -> Vec<(String, Vec<String>)> {
        let mut grouped: BTreeMap<(usize, &str), Vec<String>> = BTreeMap::new();
        for (file, tier) in &self.files {
            let rank = ENVIRONMENT_PRIORITY
                .iter()
                .position(|e| e == tier)
                .unwrap_or(ENVIRONMENT_PRIORITY.len());
            grouped.entry((rank, tier.as_str())).or_default().push(file.clone());
        }
        grouped.into_iter().map(|((_, tier), files)| (tier.to_string(), files)).collect()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Log the files used per tier and a per-tier count summary.
    pub fn log_report(&self) {
        let grouped = self.by_tier();
        if grouped.is_empty() {
            return;
        }

        for (tier, files) in &grouped {
            tracing::info!("The following {} files were used from the {tier} environment:", files.len());
            for file in files {
                tracing::info!("  {file}");
            }
        }

        let stats = grouped
            .iter()
            .map(|(tier, files)| format!("{tier}: {} files", files.len()))
            .collect::<Vec<_>>()
            .join("\n  ");
        tracing::info!("*****   Used template files from the following environments:\n  {stats}");
    }
}
