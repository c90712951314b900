//! Deployment configuration
//!
//! The configuration file (YAML or JSON) describes the run environment, the
//! shared globals, an optional version table file and the list of stacks:
//!
//! ```yaml
//! environment: devops
//! repo_versions_file: ../versions.yaml
//! globals:
//!   VpcId: vpc-123
//!   ImageTag: { $version: org/app }
//! stacks:
//!   - stack_name: network
//!   - stack_name: api
//!     template_file: api_service.yaml
//!     parameters:
//!       Vpc: { $ref: VpcId }
//!       Tag: { $sub: "api-${ImageTag}" }
//!     dependencies: [network]
//!   - stack_name: legacy
//!     disabled: true
//! ```
//!
//! Loading happens in two steps: serde parses the raw document, then
//! [`DeploymentConfig::from_raw`] validates it and turns every value into a
//! [`ValueSpec`]. After loading, the configuration is read-only.

pub mod overrides;
pub mod parser;
pub mod value;

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::constants::TEMPLATE_EXTENSION;
use crate::core::DeployError;
use crate::utils::naming::kebab_to_snake_case;

pub use overrides::{load_override_globals, parse_override_globals};
pub use parser::{ConfigFormat, parse_config, parse_config_str};
pub use value::{OrderedValues, ValueSpec, value_type_name};

/// Raw configuration document as it appears on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDeploymentConfig {
    /// Run environment name
    #[serde(default)]
    pub environment: Option<String>,
    /// Shared globals
    #[serde(default)]
    pub globals: OrderedValues,
    /// Version table file, relative to the config file
    #[serde(default)]
    pub repo_versions_file: Option<String>,
    /// Stack definitions
    pub stacks: Vec<RawStack>,
}

/// Raw stack entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStack {
    /// Base stack name; absent means the entry is skipped
    #[serde(default)]
    pub stack_name: Option<String>,
    /// Explicit template file name
    #[serde(default)]
    pub template_file: Option<String>,
    /// Parameter values
    #[serde(default)]
    pub parameters: OrderedValues,
    /// Base names of the stacks this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Disabled stacks are neither deployed nor allowed as dependencies
    #[serde(default)]
    pub disabled: bool,
}

/// One declared deployable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDefinition {
    /// Base name, unique in the configuration
    pub name: Option<String>,
    /// Template file name, explicit or derived from the name
    pub template_file: Option<String>,
    /// Parameters in declaration order
    pub parameters: Vec<(String, ValueSpec)>,
    /// Base names of dependencies, in declaration order
    pub dependencies: Vec<String>,
    /// Whether the stack is excluded from the run
    pub disabled: bool,
}

impl StackDefinition {
    /// Template file name: the explicit one, or `snake_case(name).yaml`.
    pub fn template_file_name(&self) -> Option<String> {
        self.template_file.clone().or_else(|| self.name.as_deref().map(template_file_for))
    }

    /// Environment-suffixed stack name.
    pub fn full_name(&self, environment: Option<&str>) -> Option<String> {
        self.name.as_deref().map(|name| suffixed_stack_name(name, environment))
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    /// Run environment name
    pub environment: String,
    /// Globals in declaration order
    pub globals: Vec<(String, ValueSpec)>,
    /// Version table file, resolved against the config directory
    pub repo_versions_file: Option<PathBuf>,
    /// Stacks in declaration order
    pub stacks: Vec<StackDefinition>,
    /// Path the configuration was loaded from
    pub source: PathBuf,
}

impl DeploymentConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw: RawDeploymentConfig = parse_config(path)?;
        Self::from_raw(raw, path)
    }

    /// Validate a raw document loaded from `source`.
    ///
    /// Fails when the environment is missing, when a stack name repeats, or
    /// when any global or parameter is neither a scalar nor a directive.
    pub fn from_raw(raw: RawDeploymentConfig, source: &Path) -> Result<Self> {
        let environment = raw
            .environment
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| DeployError::EnvironmentMissing {
                file: source.display().to_string(),
            })?;

        let globals = convert_values(raw.globals, "globals")?;

        let mut seen = HashSet::new();
        let mut stacks = Vec::with_capacity(raw.stacks.len());
        for raw_stack in raw.stacks {
            if let Some(name) = &raw_stack.stack_name
                && !seen.insert(name.clone())
            {
                return Err(DeployError::DuplicateStack {
                    name: name.clone(),
                }
                .into());
            }
            let owner = raw_stack
                .stack_name
                .as_deref()
                .map(|n| suffixed_stack_name(n, Some(&environment)))
                .unwrap_or_else(|| "<unnamed stack>".to_string());
            stacks.push(StackDefinition {
                parameters: convert_values(raw_stack.parameters, &owner)?,
                name: raw_stack.stack_name,
                template_file: raw_stack.template_file,
                dependencies: raw_stack.dependencies,
                disabled: raw_stack.disabled,
            });
        }

        let repo_versions_file =
            raw.repo_versions_file.map(|file| config_dir(source).join(file));

        Ok(Self {
            environment,
            globals,
            repo_versions_file,
            stacks,
            source: source.to_path_buf(),
        })
    }

    /// Directory containing the configuration file.
    pub fn config_dir(&self) -> PathBuf {
        config_dir(&self.source)
    }

    /// Replace or append globals with literal overrides.
    pub fn apply_overrides(&mut self, overrides: Vec<(String, String)>) {
        for (key, value) in overrides {
            tracing::info!("Using override global {key}: {value}");
            match self.globals.iter_mut().find(|(k, _)| *k == key) {
                Some((_, spec)) => *spec = ValueSpec::Literal(value),
                None => self.globals.push((key, ValueSpec::Literal(value))),
            }
        }
    }

    /// Environment-suffixed names of every named stack, disabled included.
    pub fn full_stack_names(&self) -> Vec<String> {
        self.stacks.iter().filter_map(|s| s.full_name(Some(&self.environment))).collect()
    }
}

fn convert_values(values: OrderedValues, owner: &str) -> Result<Vec<(String, ValueSpec)>> {
    values
        .0
        .into_iter()
        .map(|(key, value)| match ValueSpec::from_value(value) {
            Ok(spec) => Ok((key, spec)),
            Err(actual_type) => Err(DeployError::InvalidParameterType {
                owner: owner.to_string(),
                key,
                actual_type,
            }
            .into()),
        })
        .collect()
}

fn config_dir(source: &Path) -> PathBuf {
    source.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// `"{name}-{environment}"`, or `name` when there is no environment.
pub fn suffixed_stack_name(name: &str, environment: Option<&str>) -> String {
    match environment {
        Some(env) => format!("{name}-{env}"),
        None => name.to_string(),
    }
}

/// Name-derived template file: kebab-case to snake_case plus extension.
pub fn template_file_for(stack_name: &str) -> String {
    format!("{}.{TEMPLATE_EXTENSION}", kebab_to_snake_case(stack_name))
}
