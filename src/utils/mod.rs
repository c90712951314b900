//! Small shared helpers
//!
//! - [`naming`] - stack name suffix stripping, comparison and suggestions
//! - [`backoff`] - retry schedule for rate-limited worker invocations
//! - [`command`] - external command builder with timeout and output capture

pub mod backoff;
pub mod command;
pub mod naming;

pub use backoff::{RateLimitBackoff, invoke_retry_delays};
pub use command::{CommandOutput, ExternalCommand};
pub use naming::{compare_stack_names, find_similar_names, kebab_to_snake_case, strip_environment_suffix};
