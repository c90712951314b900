//! stack-deployer - dependency-ordered deployment of infrastructure stacks
//!
//! Deploys a set of interdependent infrastructure-as-code stacks described in
//! one configuration file. Every stack gets its parameters resolved from
//! literals, shared globals and repository versions, its template located
//! along an environment tier chain, and is then handed to a remote worker
//! function in dependency order. Stacks without a dependency on each other
//! are deployed concurrently.
//!
//! # Architecture Overview
//!
//! ```text
//! config file ──► DeploymentConfig ──► prepare_plan ──► DeploymentPlan ──► DeploymentDriver
//!                   (config)            (resolver)                           (deploy)
//!                                          │
//!                     versions file ◄──────┤ globals → parameters → graph → generations
//!                     templates     ◄──────┘
//! ```
//!
//! # Core Modules
//!
//! - [`config`] - configuration file model, value directives and override globals
//! - [`version`] - repository version table lookups
//! - [`templating`] - template lookup across environment tiers, template
//!   documents, `$name` substitution and cfn-lint integration
//! - [`resolver`] - globals resolution, parameter materialization, dependency
//!   graph and generation scheduling, assembled into a [`resolver::DeploymentPlan`]
//! - [`deploy`] - worker invocation with backoff, status polling and the
//!   generation-by-generation driver
//! - [`cli`] - `deploy`, `dump` and `dump-graph` commands
//! - [`core`] - [`core::DeployError`] and user-facing error reports
//! - [`utils`] - external commands, backoff schedules and stack naming helpers
//!
//! # Configuration Format
//!
//! ```yaml
//! environment: devops
//! repo_versions_file: ../versions.yaml
//! globals:
//!   VpcCidr: 10.0.0.0/16
//!   ImageTag: { $version: org/service }
//!   BucketName: { $sub: "artifacts-${Environment}" }
//! stacks:
//!   - stack_name: network
//!   - stack_name: service
//!     template_file: service.yaml
//!     dependencies: [network]
//!     parameters:
//!       Cidr: { $ref: VpcCidr }
//! ```
//!
//! Stack names are suffixed with the environment (`network-devops`);
//! templates default to the snake_case stack name (`network.yaml`).

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod deploy;
pub mod resolver;
pub mod templating;
pub mod utils;
pub mod version;

// test_utils is available for unit tests and for integration tests via the test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
