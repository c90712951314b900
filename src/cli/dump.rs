//! `dump` command: print the resolved worker messages without deploying.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::common::{GlobalOptions, lint_config, load_config, validate_stack_filter};
use crate::resolver::{PlannedStack, prepare_plan};
use crate::utils::compare_stack_names;

/// Resolve every stack and print the messages that would be sent.
///
/// With the global `--verbose` flag every parameter and the full template
/// body are printed; otherwise one summary line per stack.
#[derive(Args, Debug)]
pub struct DumpCommand {
    /// Deployment configuration file
    config: PathBuf,

    /// Only print this stack; the environment suffix is optional
    #[arg(long, value_name = "NAME")]
    stack_name: Option<String>,
}

impl DumpCommand {
    /// Execute the dump.
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let config = load_config(&self.config, options)?;
        if let Some(filter) = &self.stack_name {
            validate_stack_filter(&config, filter)?;
        }

        let plan = prepare_plan(&config)?;
        if options.lint {
            lint_config(&config, None).await?;
        }

        let filter = self.stack_name.as_deref();
        let total = plan.total();
        let mut processed = 0;

        for (idx, generation) in plan.generations.iter().enumerate() {
            let selected: Vec<&PlannedStack> = generation
                .iter()
                .filter(|stack| filter.is_none_or(|f| compare_stack_names(stack.stack_name(), f)))
                .collect();
            if selected.is_empty() {
                continue;
            }

            if options.verbose {
                println!("*** Generation {idx}:");
            }
            for stack in selected {
                processed += 1;
                if options.verbose {
                    print_message(stack);
                } else {
                    println!(
                        "{} {} using {} ({} parameters)",
                        "✓".green(),
                        stack.stack_name(),
                        stack.template_file,
                        stack.message.parameters.len()
                    );
                }
            }
        }

        println!("Summary: processed {processed}/{total} templates");
        Ok(())
    }
}

fn print_message(stack: &PlannedStack) {
    println!(
        "Message for {} using template {}:",
        stack.stack_name().bold(),
        stack.template_file
    );
    println!("Parameters:");
    for (key, value) in &stack.message.parameters {
        println!("  {key}: {value}");
    }
    println!("Template content hash: {}", stack.message.template_content_hash);
    println!("Template:\n{}", stack.message.template);
}
