//! Worker invocation.
//!
//! The worker is a remote function that performs the actual stack update.
//! It receives the [`ResolvedMessage`] wrapped in a queue-style envelope and
//! answers with a list of per-item status objects:
//!
//! ```json
//! [{"status": "ok", "stack_name": "api-devops"}, {"status": "error", "reason": "..."}]
//! ```
//!
//! Any item with `"status": "error"` fails the stack.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::DeployError;
use crate::deploy::WorkerSettings;
use crate::resolver::ResolvedMessage;
use crate::utils::invoke_retry_delays;

/// Envelope sent to the worker: `{"Records": [{"body": "<message json>"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerEnvelope {
    /// Queue records; always exactly one
    #[serde(rename = "Records")]
    pub records: Vec<EnvelopeRecord>,
}

/// One envelope record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeRecord {
    /// JSON-encoded [`ResolvedMessage`]
    pub body: String,
}

impl WorkerEnvelope {
    /// Wrap a message.
    pub fn for_message(message: &ResolvedMessage) -> Result<Self> {
        Ok(Self {
            records: vec![EnvelopeRecord {
                body: serde_json::to_string(message)?,
            }],
        })
    }
}

/// Raw worker answer; a JSON value, or a JSON string if the body was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResponse {
    /// Response payload
    pub payload: Value,
}

impl WorkerResponse {
    /// Parse a raw response body, keeping non-JSON bodies as strings.
    pub fn from_body(body: &str) -> Self {
        let payload =
            serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        Self {
            payload,
        }
    }

    /// Whether the payload reports success for every item.
    ///
    /// Fails with [`DeployError::InvalidWorkerResponse`] when the payload is
    /// not a list of objects.
    pub fn all_succeeded(&self, stack_name: &str) -> Result<bool> {
        let invalid = |reason: String| DeployError::InvalidWorkerResponse {
            stack: stack_name.to_string(),
            reason,
        };

        let Value::Array(items) = &self.payload else {
            return Err(invalid(format!("expected a list of status objects, got {}", self.payload)).into());
        };

        let mut succeeded = true;
        for item in items {
            let Value::Object(fields) = item else {
                return Err(invalid(format!("status item is not an object: {item}")).into());
            };
            if fields.get("status").and_then(Value::as_str) == Some("error") {
                succeeded = false;
            }
        }
        Ok(succeeded)
    }
}

/// Failure of a single invocation attempt.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The worker asked the caller to slow down; the attempt may be retried
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Any other failure; never retried
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Collaborator that invokes the remote worker synchronously.
#[async_trait]
pub trait StackWorker: Send + Sync {
    /// Worker name used in log lines and errors.
    fn worker_name(&self) -> &str;

    /// Invoke the worker once for `stack_name`.
    async fn invoke(&self, stack_name: &str, envelope: &WorkerEnvelope) -> Result<WorkerResponse, InvokeError>;
}

/// Invoke the worker, retrying rate-limited attempts with capped exponential
/// backoff and jitter.
pub async fn invoke_with_backoff(
    worker: &dyn StackWorker,
    stack_name: &str,
    envelope: &WorkerEnvelope,
    settings: &WorkerSettings,
) -> Result<WorkerResponse> {
    let delays = invoke_retry_delays(
        settings.max_invoke_attempts,
        settings.initial_backoff,
        settings.max_backoff,
        settings.backoff_jitter,
    );

    let mut attempts = 0u32;
    let result = tokio_retry::RetryIf::spawn(
        delays,
        || {
            attempts += 1;
            worker.invoke(stack_name, envelope)
        },
        |e: &InvokeError| {
            let retry = matches!(e, InvokeError::RateLimited(_));
            if retry {
                tracing::info!("Rate exceeded. ({stack_name}) retrying after backoff...");
            }
            retry
        },
    )
    .await;

    match result {
        Ok(response) => Ok(response),
        Err(InvokeError::RateLimited(_)) => {
            tracing::error!("Max retry attempts reached. ({stack_name}) unable to invoke worker.");
            Err(DeployError::RateLimited {
                worker: worker.worker_name().to_string(),
                stack: stack_name.to_string(),
                attempts,
            }
            .into())
        }
        Err(InvokeError::Failed(e)) => Err(DeployError::WorkerInvocationFailed {
            worker: worker.worker_name().to_string(),
            stack: stack_name.to_string(),
            reason: format!("{e:#}"),
        }
        .into()),
    }
}
