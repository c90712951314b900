//! Deployment execution.
//!
//! The driver walks a [`DeploymentPlan`](crate::resolver::DeploymentPlan)
//! generation by generation. Every stack of a generation is handed to the
//! [`StackWorker`] concurrently; each invocation is followed by polling the
//! [`StackStatusSource`] until the stack is stable. The next generation
//! starts only after the current one has fully completed.
//!
//! The two collaborators are traits so the driver can be exercised without
//! AWS; [`aws_cli`] holds the implementations backed by the `aws` tool.

pub mod aws_cli;
pub mod driver;
pub mod status;
pub mod worker;

use std::time::Duration;

use crate::constants::{
    DEFAULT_REGION, INITIAL_INVOKE_BACKOFF, INVOKE_BACKOFF_JITTER, MAX_INVOKE_ATTEMPTS, MAX_INVOKE_BACKOFF,
    MAX_STATUS_POLLS, STATUS_POLL_INTERVAL,
};

pub use aws_cli::{AwsCliStatusSource, AwsCliWorker};
pub use driver::{DeploymentDriver, DeploymentOutcome, DeploymentReport};
pub use status::{StackStatusSource, StatusClass, wait_for_stable_state};
pub use worker::{
    EnvelopeRecord, InvokeError, StackWorker, WorkerEnvelope, WorkerResponse, invoke_with_backoff,
};

/// Retry and polling budgets for one deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Invocation attempts when rate limited, including the first
    pub max_invoke_attempts: u32,
    /// Delay after the first rate-limited attempt
    pub initial_backoff: Duration,
    /// Cap for a single backoff delay
    pub max_backoff: Duration,
    /// Maximum random jitter per delay
    pub backoff_jitter: Duration,
    /// Status polls before giving up on a stack
    pub max_polls: u32,
    /// Sleep between status polls
    pub poll_interval: Duration,
    /// AWS region for the CLI collaborators
    pub region: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_invoke_attempts: MAX_INVOKE_ATTEMPTS,
            initial_backoff: INITIAL_INVOKE_BACKOFF,
            max_backoff: MAX_INVOKE_BACKOFF,
            backoff_jitter: INVOKE_BACKOFF_JITTER,
            max_polls: MAX_STATUS_POLLS,
            poll_interval: STATUS_POLL_INTERVAL,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl WorkerSettings {
    /// Same budgets with every delay set to zero.
    #[must_use]
    pub fn without_delays(self) -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_jitter: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..self
        }
    }
}
