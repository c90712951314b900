//! Command-line interface for the stack deployer.
//!
//! # Commands
//!
//! - `deploy <WORKER> <CONFIG>` - resolve the configuration and deploy every
//!   stack, generation by generation, through the worker function
//! - `dump <CONFIG>` - resolve and print the worker messages without
//!   deploying anything
//! - `dump-graph <CONFIG>` - print the generations and each stack's
//!   transitive dependencies
//!
//! # Global options
//!
//! Logging verbosity, template linting, override globals and the retry and
//! polling budgets apply to every command:
//!
//! ```bash
//! stack-deployer --verbose dump config/devops/stacks.yaml
//! stack-deployer --lint --override-globals-file overrides.env \
//!     deploy stack-deployer-fn config/devops/stacks.yaml --stack-name api
//! ```
//!
//! Log output goes to stderr; command results go to stdout.

pub mod common;
pub mod deploy;
pub mod dump;
pub mod dump_graph;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_REGION;
use crate::deploy::aws_cli::AWS_BINARY;

pub use common::GlobalOptions;

/// Deploy interdependent infrastructure stacks in dependency order.
#[derive(Parser, Debug)]
#[command(
    name = "stack-deployer",
    about = "Deploy interdependent infrastructure stacks in dependency order",
    version,
    long_about = "Resolves globals, repository versions and template parameters for every stack of a \
                  configuration, orders the stacks into dependency generations and hands each stack \
                  to a worker function that applies the update."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging; `dump` also prints parameters and template bodies
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Run cfn-lint on the templates before the command
    #[arg(long, global = true)]
    lint: bool,

    /// File of `key=value` lines overriding configured globals
    #[arg(long, global = true, value_name = "FILE")]
    override_globals_file: Option<PathBuf>,

    /// AWS region of the worker function and the stacks
    #[arg(long, global = true, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Worker invocation attempts when rate limited
    #[arg(long, global = true, value_name = "N")]
    max_invoke_attempts: Option<u32>,

    /// Seconds between two stack status polls
    #[arg(long, global = true, value_name = "SECS")]
    poll_interval_secs: Option<u64>,

    /// Status polls before a stack counts as never stable
    #[arg(long, global = true, value_name = "N")]
    max_polls: Option<u32>,

    /// `aws` executable used for invocations and status polls
    #[arg(long, global = true, env = "STACK_DEPLOYER_AWS_BINARY", default_value = AWS_BINARY, hide = true)]
    aws_binary: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy the stacks of a configuration through a worker function
    Deploy(deploy::DeployCommand),

    /// Print the resolved worker messages without deploying
    Dump(dump::DumpCommand),

    /// Print the deployment generations and stack dependencies
    #[command(alias = "dump_graph")]
    DumpGraph(dump_graph::DumpGraphCommand),
}

impl Cli {
    /// Initialise logging and run the selected command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());
        let options = self.global_options();

        match self.command {
            Commands::Deploy(cmd) => cmd.execute(&options).await,
            Commands::Dump(cmd) => cmd.execute(&options).await,
            Commands::DumpGraph(cmd) => cmd.execute(&options).await,
        }
    }

    /// Default log level for the verbosity flags.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Options shared by all subcommands.
    #[must_use]
    pub fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            verbose: self.verbose,
            lint: self.lint,
            override_globals_file: self.override_globals_file.clone(),
            settings: common::worker_settings(
                self.region.clone(),
                self.max_invoke_attempts,
                self.poll_interval_secs,
                self.max_polls,
            ),
            aws_binary: self.aws_binary.clone(),
        }
    }
}

/// Install the global tracing subscriber; `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
