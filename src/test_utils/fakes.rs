//! In-memory collaborators for the deployment driver.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::deploy::{InvokeError, StackStatusSource, StackWorker, WorkerEnvelope, WorkerResponse};
use crate::resolver::ResolvedMessage;

/// Scripted answer of a [`ScriptedWorker`].
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    /// Answer with this payload
    Payload(Value),
    /// Signal rate limiting
    RateLimited,
    /// Fail the invocation with this message
    Fail(String),
}

impl WorkerReply {
    /// `[{"status": "ok"}]`
    pub fn ok() -> Self {
        Self::Payload(json!([{"status": "ok"}]))
    }

    /// `[{"status": "error", "reason": reason}]`
    pub fn error(reason: &str) -> Self {
        Self::Payload(json!([{"status": "error", "reason": reason}]))
    }
}

/// One recorded worker call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Stack the call was made for
    pub stack_name: String,
    /// Decoded envelope body
    pub message: ResolvedMessage,
}

/// Worker answering from per-stack scripts, [`WorkerReply::ok`] by default.
pub struct ScriptedWorker {
    name: String,
    delay: Duration,
    scripts: Mutex<HashMap<String, VecDeque<WorkerReply>>>,
    invocations: Mutex<Vec<Invocation>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedWorker {
    /// Worker named `name` that succeeds for every stack.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            scripts: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every invocation for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue replies for `stack_name`; afterwards the default applies again.
    pub fn script(&self, stack_name: &str, replies: impl IntoIterator<Item = WorkerReply>) {
        self.lock_scripts().entry(stack_name.to_string()).or_default().extend(replies);
    }

    /// All calls so far, in call order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Stack names of all calls, in call order.
    pub fn invoked_stacks(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.stack_name).collect()
    }

    /// Number of calls made for `stack_name`.
    pub fn invocation_count(&self, stack_name: &str) -> usize {
        self.invocations().iter().filter(|i| i.stack_name == stack_name).count()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<WorkerReply>>> {
        self.scripts.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_reply(&self, stack_name: &str) -> WorkerReply {
        self.lock_scripts()
            .get_mut(stack_name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(WorkerReply::ok)
    }
}

#[async_trait]
impl StackWorker for ScriptedWorker {
    fn worker_name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, stack_name: &str, envelope: &WorkerEnvelope) -> Result<WorkerResponse, InvokeError> {
        let body = envelope.records.first().map(|r| r.body.as_str()).unwrap_or_default();
        let message: ResolvedMessage = serde_json::from_str(body).map_err(anyhow::Error::from)?;
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(Invocation {
                stack_name: stack_name.to_string(),
                message,
            });
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_reply(stack_name) {
            WorkerReply::Payload(payload) => Ok(WorkerResponse {
                payload,
            }),
            WorkerReply::RateLimited => Err(InvokeError::RateLimited("TooManyRequestsException".to_string())),
            WorkerReply::Fail(reason) => Err(InvokeError::Failed(anyhow::anyhow!(reason))),
        }
    }
}

/// Status source answering from per-stack status sequences.
///
/// The last status of a sequence repeats; stacks without a sequence report
/// `UPDATE_COMPLETE`.
pub struct ScriptedStatus {
    sequences: Mutex<HashMap<String, VecDeque<String>>>,
    polls: Mutex<HashMap<String, usize>>,
}

impl Default for ScriptedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStatus {
    /// Status source reporting every stack as stable.
    pub fn new() -> Self {
        Self {
            sequences: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Report `statuses` in order for `stack_name`.
    pub fn script(&self, stack_name: &str, statuses: &[&str]) {
        if let Ok(mut sequences) = self.sequences.lock() {
            sequences.insert(stack_name.to_string(), statuses.iter().map(ToString::to_string).collect());
        }
    }

    /// Number of polls made for `stack_name`.
    pub fn poll_count(&self, stack_name: &str) -> usize {
        self.polls.lock().ok().and_then(|p| p.get(stack_name).copied()).unwrap_or(0)
    }
}

#[async_trait]
impl StackStatusSource for ScriptedStatus {
    async fn stack_status(&self, stack_name: &str) -> Result<String> {
        if let Ok(mut polls) = self.polls.lock() {
            *polls.entry(stack_name.to_string()).or_default() += 1;
        }

        let mut sequences = self.sequences.lock().map_err(|_| anyhow::anyhow!("status script poisoned"))?;
        let status = match sequences.get_mut(stack_name) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(status.unwrap_or_else(|| "UPDATE_COMPLETE".to_string()))
    }
}
