//! `dump-graph` command: print generations and transitive dependencies.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::common::{GlobalOptions, lint_config, load_plan};

/// Print every generation and each stack's transitive dependencies.
#[derive(Args, Debug)]
pub struct DumpGraphCommand {
    /// Deployment configuration file
    config: PathBuf,
}

impl DumpGraphCommand {
    /// Execute the graph dump.
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let (config, plan) = load_plan(&self.config, options)?;
        if options.lint {
            lint_config(&config, None).await?;
        }

        for (idx, generation) in plan.generations.iter().enumerate() {
            println!("*** Generation {idx}:");
            for stack in generation {
                println!("Stack {}", stack.stack_name());
                for dep in plan.graph.transitive_deps(stack.stack_name()) {
                    println!("  - {dep}");
                }
            }
        }
        Ok(())
    }
}
