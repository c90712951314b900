//! Test utilities for the stack deployer
//!
//! Helpers for unit and integration tests:
//! - [`TestLayout`] - a temporary environment tree with config, templates and
//!   a versions file
//! - [`ScriptedWorker`] and [`ScriptedStatus`] - in-memory collaborators for
//!   the deployment driver that record every call
//! - [`init_test_logging`] - once-guarded tracing setup
//!
//! # Example
//!
//! ```rust,no_run
//! use stack_deployer::test_utils::TestLayout;
//!
//! let layout = TestLayout::new("devops").unwrap();
//! layout.write_template("devops", "api.yaml", &["ImageTag"]).unwrap();
//! layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
//! let config = layout.load_config().unwrap();
//! assert_eq!(config.stacks.len(), 1);
//! ```

pub mod fakes;
pub mod layout;

pub use fakes::{Invocation, ScriptedStatus, ScriptedWorker, WorkerReply};
pub use layout::TestLayout;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::deploy::WorkerSettings;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; without either, tests run
/// without a subscriber.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Default budgets with all sleeps removed.
pub fn fast_settings() -> WorkerSettings {
    WorkerSettings::default().without_delays()
}
