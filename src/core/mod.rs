//! Core types shared by every stage of the deployer
//!
//! - [`DeployError`] - enumerated failure modes, from configuration errors to
//!   per-stack dispatch failures
//! - [`ErrorContext`] - user-facing wrapper with details and suggestions
//! - [`user_friendly_error`] - converts any [`anyhow::Error`] for CLI display

pub mod error;

pub use error::{DeployError, ErrorContext, user_friendly_error};
