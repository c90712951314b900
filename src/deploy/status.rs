//! Stack status polling.

use anyhow::Result;
use async_trait::async_trait;

use crate::constants::{ERROR_STATUSES, STABLE_STATUSES};
use crate::core::DeployError;
use crate::deploy::WorkerSettings;

/// Collaborator reporting the current infrastructure status of a stack.
#[async_trait]
pub trait StackStatusSource: Send + Sync {
    /// Current status string, e.g. `UPDATE_IN_PROGRESS`.
    async fn stack_status(&self, stack_name: &str) -> Result<String>;
}

/// Coarse classification of a status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Terminal and healthy
    Stable,
    /// Terminal and failed
    Error,
    /// Anything else; keep polling
    InProgress,
}

impl StatusClass {
    /// Classify a raw status string.
    pub fn of(status: &str) -> Self {
        if STABLE_STATUSES.contains(&status) {
            Self::Stable
        } else if ERROR_STATUSES.contains(&status) {
            Self::Error
        } else {
            Self::InProgress
        }
    }
}

/// Poll `source` until the stack reaches a stable state.
///
/// Returns the stable status. Error states and an exhausted poll budget
/// are reported as [`DeployError::StackErrorState`] and
/// [`DeployError::StackNotStable`].
pub async fn wait_for_stable_state(
    source: &dyn StackStatusSource,
    stack_name: &str,
    settings: &WorkerSettings,
) -> Result<String> {
    let mut last_status = String::from("UNKNOWN");

    for poll in 1..=settings.max_polls {
        let status = source.stack_status(stack_name).await?;
        match StatusClass::of(&status) {
            StatusClass::Stable => {
                tracing::debug!("Stack {stack_name} is stable ({status}) after {poll} poll(s)");
                return Ok(status);
            }
            StatusClass::Error => {
                tracing::error!("Stack {stack_name} is in error state {status}");
                return Err(DeployError::StackErrorState {
                    stack: stack_name.to_string(),
                    status,
                }
                .into());
            }
            StatusClass::InProgress => {
                tracing::info!("Stack status of {stack_name} is still in {status}, waiting...");
                last_status = status;
            }
        }

        if poll < settings.max_polls {
            tokio::time::sleep(settings.poll_interval).await;
        }
    }

    Err(DeployError::StackNotStable {
        stack: stack_name.to_string(),
        status: last_status,
        polls: settings.max_polls,
    }
    .into())
}
