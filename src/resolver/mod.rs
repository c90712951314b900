//! Deployment planning.
//!
//! [`prepare_plan`] runs the whole pipeline for a loaded configuration:
//!
//! 1. Load the version table (if configured) and resolve globals
//! 2. Materialize every stack into a [`ResolvedMessage`]
//! 3. Build the dependency graph and split it into generations
//! 4. Report unused globals and the tiers templates were taken from
//!
//! The resulting [`DeploymentPlan`] is read-only input for the deployment
//! driver and the `dump` commands. Every error here is a configuration
//! error: nothing has been dispatched yet.

pub mod dependency_graph;
pub mod generations;
pub mod globals;
pub mod parameters;

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::DeploymentConfig;
use crate::templating::{TemplateLocator, TemplateSources};
use crate::utils::compare_stack_names;
use crate::version::VersionTable;

pub use dependency_graph::StackGraph;
pub use generations::compute_generations;
pub use globals::{GlobalUsage, ResolvedGlobals, resolve_globals};
pub use parameters::{MaterializeContext, Materialized, PreparedStack, ResolvedMessage, materialize};

/// A stack placed in the deployment schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStack {
    /// Message for the worker
    pub message: ResolvedMessage,
    /// Template file name as configured or derived
    pub template_file: String,
    /// Path the template was read from
    pub template_path: PathBuf,
    /// Generation index, 0 first
    pub generation: usize,
    /// Position inside the generation
    pub position: usize,
    /// Position across the whole plan, 0-based
    pub sequence: usize,
    /// Number of stacks in the plan
    pub total: usize,
}

impl PlannedStack {
    /// Environment-suffixed stack name.
    pub fn stack_name(&self) -> &str {
        &self.message.stack_name
    }
}

/// Fully resolved, ordered deployment plan.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Run environment
    pub environment: String,
    /// Stacks grouped by generation
    pub generations: Vec<Vec<PlannedStack>>,
    /// Dependency graph over enabled, named stacks
    pub graph: StackGraph,
    /// Globals nothing referenced, sorted
    pub unused_globals: Vec<String>,
    /// Tier each template came from
    pub template_sources: TemplateSources,
}

impl DeploymentPlan {
    /// All planned stacks in schedule order.
    pub fn stacks(&self) -> impl Iterator<Item = &PlannedStack> {
        self.generations.iter().flatten()
    }

    /// Environment-suffixed names in schedule order.
    pub fn stack_names(&self) -> Vec<String> {
        self.stacks().map(|s| s.message.stack_name.clone()).collect()
    }

    /// Number of planned stacks.
    pub fn total(&self) -> usize {
        self.generations.iter().map(Vec::len).sum()
    }

    /// First stack matching `filter`, ignoring environment suffixes.
    pub fn find(&self, filter: &str) -> Option<&PlannedStack> {
        self.stacks().find(|s| compare_stack_names(s.stack_name(), filter))
    }
}

/// Build the plan for a configuration using the current time as run timestamp.
pub fn prepare_plan(config: &DeploymentConfig) -> Result<DeploymentPlan> {
    prepare_plan_at(config, chrono::Utc::now().timestamp())
}

/// Build the plan for a configuration with an explicit run timestamp.
pub fn prepare_plan_at(config: &DeploymentConfig, timestamp: i64) -> Result<DeploymentPlan> {
    let versions = match &config.repo_versions_file {
        Some(path) => VersionTable::load(path)?,
        None => VersionTable::default(),
    };

    let (globals, mut usage) =
        resolve_globals(&config.globals, &versions, &config.environment, timestamp)?;

    let locator = TemplateLocator::new(&config.config_dir(), &config.environment);
    let mut sources = TemplateSources::new();
    let ctx = MaterializeContext {
        globals: &globals,
        versions: &versions,
        environment: &config.environment,
        locator: &locator,
    };

    let mut prepared: HashMap<String, PreparedStack> = HashMap::new();
    for stack in &config.stacks {
        if let Materialized::Ready(stack) = materialize(stack, ctx, &mut usage, &mut sources)? {
            prepared.insert(stack.message.stack_name.clone(), *stack);
        }
    }

    let graph = StackGraph::build(config)?;
    let generation_names = compute_generations(&graph)?;

    let unused_globals = usage.unused(&globals);
    for unused in &unused_globals {
        tracing::warn!("Unused global {unused}");
    }

    let total = generation_names.iter().map(Vec::len).sum();
    let mut sequence = 0;
    let mut generations = Vec::with_capacity(generation_names.len());
    for (generation, names) in generation_names.into_iter().enumerate() {
        let mut planned = Vec::with_capacity(names.len());
        for (position, name) in names.into_iter().enumerate() {
            let Some(stack) = prepared.remove(&name) else {
                continue;
            };
            planned.push(PlannedStack {
                message: stack.message,
                template_file: stack.template_file,
                template_path: stack.template_path,
                generation,
                position,
                sequence,
                total,
            });
            sequence += 1;
        }
        generations.push(planned);
    }

    sources.log_report();

    Ok(DeploymentPlan {
        environment: config.environment.clone(),
        generations,
        graph,
        unused_globals,
        template_sources: sources,
    })
}
