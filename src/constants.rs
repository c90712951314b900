//! Global constants used throughout the deployer.
//!
//! Retry budgets, poll intervals, well-known global names and the
//! environment tier order live here so they are discoverable in one place.

use std::time::Duration;

/// Environment tiers in lookup priority order.
///
/// Template lookup starts at the run environment and walks towards the end
/// of this list. The same list drives environment-suffix stripping.
pub const ENVIRONMENT_PRIORITY: [&str; 4] = ["development", "staging", "production", "devops"];

/// Synthetic global holding the run timestamp (epoch seconds).
pub const TIMESTAMP_GLOBAL: &str = "__deploy_timestamp__";

/// Well-known global holding the run environment name.
pub const ENVIRONMENT_GLOBAL: &str = "Environment";

/// Extension appended to name-derived template files.
pub const TEMPLATE_EXTENSION: &str = "yaml";

/// Number of characters kept from a repository-wide version identifier.
pub const SHORT_VERSION_LEN: usize = 7;

/// Maximum worker invocation attempts when the worker signals rate limiting.
pub const MAX_INVOKE_ATTEMPTS: u32 = 8;

/// First backoff delay after a rate-limited invocation; doubles per attempt.
pub const INITIAL_INVOKE_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for a single rate-limit backoff delay.
pub const MAX_INVOKE_BACKOFF: Duration = Duration::from_secs(120);

/// Maximum random jitter added to every rate-limit backoff delay.
pub const INVOKE_BACKOFF_JITTER: Duration = Duration::from_secs(1);

/// Number of status polls before a stack counts as never stable.
pub const MAX_STATUS_POLLS: u32 = 30;

/// Sleep between two status polls.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timeout for a single external command (aws, cfn-lint).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(900);

/// Default AWS region for the worker and status collaborators.
pub const DEFAULT_REGION: &str = "eu-central-2";

/// Region passed to cfn-lint.
pub const LINT_REGION: &str = "eu-west-1";

/// cfn-lint checks that are ignored.
pub const LINT_IGNORED_CHECKS: [&str; 2] = ["W3005", "W2001"];

/// Stack statuses that end polling successfully.
pub const STABLE_STATUSES: [&str; 2] = ["CREATE_COMPLETE", "UPDATE_COMPLETE"];

/// Stack statuses that end polling with an error.
pub const ERROR_STATUSES: [&str; 5] = [
    "ROLLBACK_COMPLETE",
    "CREATE_FAILED",
    "ROLLBACK_FAILED",
    "UPDATE_ROLLBACK_FAILED",
    "UPDATE_ROLLBACK_COMPLETE",
];

/// Lines shown before and after a configuration syntax error.
pub const ERROR_CONTEXT_LINES: usize = 5;
