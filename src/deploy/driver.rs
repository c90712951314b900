//! Generation-by-generation deployment.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::DeployError;
use crate::deploy::{
    StackStatusSource, StackWorker, WorkerEnvelope, WorkerSettings, invoke_with_backoff, wait_for_stable_state,
};
use crate::resolver::{DeploymentPlan, PlannedStack};

/// How a single dispatched stack ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// Worker reported success and the stack is stable
    Succeeded,
    /// Worker answered with at least one `"status": "error"` item
    Failed,
    /// Invocation, polling or response handling raised an error
    Errored(String),
}

impl DeploymentOutcome {
    /// Whether the stack counts as deployed.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Errored(reason) => write!(f, "errored: {reason}"),
        }
    }
}

/// Outcomes of a deployment run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    /// `(stack name, outcome)` for every dispatched stack
    pub outcomes: Vec<(String, DeploymentOutcome)>,
}

impl DeploymentReport {
    /// Names of stacks that deployed successfully.
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).map(|(n, _)| n.as_str()).collect()
    }

    /// Names of stacks that did not deploy, in completion order.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes.iter().filter(|(_, o)| !o.is_success()).map(|(n, _)| n.as_str()).collect()
    }
}

/// Drives a [`DeploymentPlan`] through a worker and a status source.
pub struct DeploymentDriver<'a> {
    worker: &'a dyn StackWorker,
    status: &'a dyn StackStatusSource,
    settings: WorkerSettings,
}

impl<'a> DeploymentDriver<'a> {
    /// Driver over the given collaborators.
    pub fn new(worker: &'a dyn StackWorker, status: &'a dyn StackStatusSource, settings: WorkerSettings) -> Self {
        Self {
            worker,
            status,
            settings,
        }
    }

    /// Deploy the plan, or only the stack matching `target`.
    ///
    /// Generations run strictly in order; stacks inside a generation run
    /// concurrently. Before a generation starts, every stack's transitive
    /// dependencies must have succeeded, otherwise the run aborts with
    /// [`DeployError::DependencyNotSucceeded`]. The dependency check is
    /// skipped for a targeted run.
    ///
    /// Returns the report when every dispatched stack succeeded and
    /// [`DeployError::FailedStacks`] otherwise.
    pub async fn deploy(&self, plan: &DeploymentPlan, target: Option<&str>) -> Result<DeploymentReport> {
        let target = match target {
            Some(filter) => {
                let Some(stack) = plan.find(filter) else {
                    return Err(DeployError::StackNotFound {
                        name: filter.to_string(),
                        available: plan.stack_names(),
                    }
                    .into());
                };
                tracing::info!("Deploying only stack {}", stack.stack_name());
                Some(stack.stack_name().to_string())
            }
            None => None,
        };

        let mut report = DeploymentReport::default();
        let mut succeeded: BTreeSet<String> = BTreeSet::new();

        for (idx, generation) in plan.generations.iter().enumerate() {
            let names: Vec<&str> = generation.iter().map(PlannedStack::stack_name).collect();
            tracing::info!("*** Deploying generation {idx}, stacks: {names:?}");

            if target.is_none() {
                check_dependencies(plan, generation, &succeeded)?;
            }

            let selected: Vec<&PlannedStack> = generation
                .iter()
                .filter(|stack| target.as_deref().is_none_or(|t| stack.stack_name() == t))
                .collect();
            let mut in_process: BTreeSet<&str> = selected.iter().copied().map(PlannedStack::stack_name).collect();

            let mut completions = stream::iter(selected)
                .map(|stack| async move { (stack, self.deploy_stack(stack).await) })
                .buffer_unordered(usize::MAX);

            while let Some((stack, outcome)) = completions.next().await {
                let name = stack.stack_name();
                in_process.remove(name);
                match &outcome {
                    DeploymentOutcome::Succeeded => {
                        succeeded.insert(name.to_string());
                    }
                    DeploymentOutcome::Failed => tracing::error!("Stack {name} failed"),
                    DeploymentOutcome::Errored(reason) => {
                        tracing::error!("Stack {name} generated an exception: {reason}");
                    }
                }
                report.outcomes.push((name.to_string(), outcome));
                tracing::info!("Still in process: {in_process:?}");
            }

            tracing::info!("*** Generation {idx} completed");
        }

        let failed: Vec<String> = report.failed().into_iter().map(str::to_string).collect();
        if !failed.is_empty() {
            tracing::error!("Failed stacks: {failed:?}");
            return Err(DeployError::FailedStacks {
                stacks: failed,
            }
            .into());
        }

        tracing::info!("Deployed {} stack(s)", report.outcomes.len());
        Ok(report)
    }

    /// Invoke, wait for stability and classify one stack.
    async fn deploy_stack(&self, stack: &PlannedStack) -> DeploymentOutcome {
        let name = stack.stack_name();
        tracing::info!(
            "({:>4}/{}) stack {name} : Invoking worker {}",
            stack.sequence + 1,
            stack.total,
            self.worker.worker_name()
        );

        match self.dispatch(stack).await {
            Ok(true) => DeploymentOutcome::Succeeded,
            Ok(false) => DeploymentOutcome::Failed,
            Err(e) => DeploymentOutcome::Errored(format!("{e:#}")),
        }
    }

    async fn dispatch(&self, stack: &PlannedStack) -> Result<bool> {
        let name = stack.stack_name();
        let envelope = WorkerEnvelope::for_message(&stack.message)?;
        let response = invoke_with_backoff(self.worker, name, &envelope, &self.settings).await?;

        let status = wait_for_stable_state(self.status, name, &self.settings).await?;
        tracing::debug!("Stack {name} settled in {status}");

        tracing::info!(
            "Worker invoked for {name} using template {}: {}",
            stack.template_file,
            response.payload
        );
        response.all_succeeded(name)
    }
}

/// Fail when a stack of `generation` has a transitive dependency that has
/// not succeeded.
fn check_dependencies(plan: &DeploymentPlan, generation: &[PlannedStack], succeeded: &BTreeSet<String>) -> Result<()> {
    for stack in generation {
        let missing: Vec<String> = plan
            .graph
            .transitive_deps(stack.stack_name())
            .into_iter()
            .filter(|dep| !succeeded.contains(dep))
            .collect();
        if !missing.is_empty() {
            tracing::error!(
                "Stack {} has missing dependencies {missing:?}, aborting deployment",
                stack.stack_name()
            );
            return Err(DeployError::DependencyNotSucceeded {
                stack: stack.stack_name().to_string(),
                missing,
            }
            .into());
        }
    }
    Ok(())
}
