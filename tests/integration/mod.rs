//! Integration test suite for stack-deployer
//!
//! End-to-end tests over real files in temporary environment trees. The
//! deployment driver runs against the in-memory collaborators from
//! `stack_deployer::test_utils`; the CLI tests run the built binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **planning**: configuration → deployment plan
//! - **driver**: generation-by-generation deployment with fake collaborators
//! - **cli**: `dump`, `dump-graph` and `deploy` through the binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod driver;
mod planning;
