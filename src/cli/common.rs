//! Shared setup for the CLI commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{DeploymentConfig, load_override_globals};
use crate::core::DeployError;
use crate::deploy::WorkerSettings;
use crate::resolver::{DeploymentPlan, prepare_plan};
use crate::templating::{TemplateLinter, TemplateLocator, TemplateSources, lint_templates};
use crate::utils::{compare_stack_names, find_similar_names, strip_environment_suffix};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Detailed output
    pub verbose: bool,
    /// Run cfn-lint on the templates
    pub lint: bool,
    /// Flat `key=value` file with highest-precedence globals
    pub override_globals_file: Option<PathBuf>,
    /// Retry and polling budgets
    pub settings: WorkerSettings,
    /// `aws` executable used by the collaborators
    pub aws_binary: PathBuf,
}

/// Load a configuration file and apply the override globals, if any.
pub fn load_config(path: &Path, options: &GlobalOptions) -> Result<DeploymentConfig> {
    let mut config = DeploymentConfig::load(path)?;
    if let Some(overrides_path) = &options.override_globals_file {
        let overrides = load_override_globals(overrides_path)
            .with_context(|| format!("Failed to load override globals from {}", overrides_path.display()))?;
        config.apply_overrides(overrides);
    }
    Ok(config)
}

/// Load the configuration and build the deployment plan.
pub fn load_plan(path: &Path, options: &GlobalOptions) -> Result<(DeploymentConfig, DeploymentPlan)> {
    let config = load_config(path, options)?;
    let plan = prepare_plan(&config)
        .with_context(|| format!("Failed to prepare deployment plan from {}", path.display()))?;
    Ok((config, plan))
}

/// Templates to lint: every named stack matching `filter` (all when `None`),
/// disabled ones included.
pub fn lint_targets(config: &DeploymentConfig, filter: Option<&str>) -> Result<Vec<(String, PathBuf)>> {
    let locator = TemplateLocator::new(&config.config_dir(), &config.environment);
    let mut sources = TemplateSources::new();
    let mut targets = Vec::new();

    for stack in &config.stacks {
        let Some(full_name) = stack.full_name(Some(&config.environment)) else {
            continue;
        };
        if filter.is_some_and(|f| !compare_stack_names(&full_name, f)) {
            continue;
        }
        let Some(file_name) = stack.template_file_name() else {
            continue;
        };
        let located = locator.locate(&file_name, &mut sources)?;
        targets.push((file_name, located.path));
    }
    Ok(targets)
}

/// Run cfn-lint over [`lint_targets`]. Returns the number of templates with findings.
pub async fn lint_config(config: &DeploymentConfig, filter: Option<&str>) -> Result<usize> {
    let targets = lint_targets(config, filter)?;
    Ok(lint_templates(TemplateLinter::discover().as_ref(), &targets).await)
}

/// Check that `filter` names an enabled stack of the configuration.
///
/// On mismatch the available base and full names are logged together with
/// close matches, and [`DeployError::StackNotFound`] is returned.
pub fn validate_stack_filter(config: &DeploymentConfig, filter: &str) -> Result<()> {
    let mut full_names: Vec<String> = config
        .stacks
        .iter()
        .filter(|stack| !stack.disabled)
        .filter_map(|stack| stack.full_name(Some(&config.environment)))
        .collect();

    if full_names.iter().any(|name| compare_stack_names(name, filter)) {
        return Ok(());
    }

    full_names.sort();
    let mut base_names: Vec<String> =
        full_names.iter().map(|name| strip_environment_suffix(name).to_string()).collect();
    base_names.sort();
    base_names.dedup();

    tracing::error!("❌ Stack name '{filter}' does not match any available stacks.");
    tracing::error!("Available stacks (without environment suffix): {}", base_names.join(", "));
    tracing::error!("Available stacks (full names): {}", full_names.join(", "));
    tracing::error!(
        "Note: You can use either the full stack name (with environment suffix) or just the base name."
    );

    let similar = find_similar_names(strip_environment_suffix(filter), &base_names);
    if !similar.is_empty() {
        tracing::error!("Did you mean: {}?", similar.join(", "));
    }

    Err(DeployError::StackNotFound {
        name: filter.to_string(),
        available: full_names,
    }
    .into())
}

/// Worker settings with the CLI overrides applied.
pub fn worker_settings(
    region: String,
    max_invoke_attempts: Option<u32>,
    poll_interval_secs: Option<u64>,
    max_polls: Option<u32>,
) -> WorkerSettings {
    let defaults = WorkerSettings::default();
    WorkerSettings {
        max_invoke_attempts: max_invoke_attempts.unwrap_or(defaults.max_invoke_attempts).max(1),
        max_polls: max_polls.unwrap_or(defaults.max_polls).max(1),
        poll_interval: poll_interval_secs.map_or(defaults.poll_interval, Duration::from_secs),
        region,
        ..defaults
    }
}
