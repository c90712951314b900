//! `deploy` command: dispatch every stack of the plan to the worker.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::common::{GlobalOptions, lint_config, load_plan};
use crate::deploy::{AwsCliStatusSource, AwsCliWorker, DeploymentDriver};

/// Deploy all stacks of a configuration in dependency order.
#[derive(Args, Debug)]
pub struct DeployCommand {
    /// Name of the worker function that applies a stack update
    worker: String,

    /// Deployment configuration file
    config: PathBuf,

    /// Deploy only this stack; the environment suffix is optional.
    ///
    /// Dependencies of the stack are not checked and not deployed.
    #[arg(long, value_name = "NAME")]
    stack_name: Option<String>,
}

impl DeployCommand {
    /// Execute the deployment.
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let (config, plan) = load_plan(&self.config, options)?;

        if options.lint {
            lint_config(&config, self.stack_name.as_deref()).await?;
        }

        let settings = options.settings.clone();
        let worker = AwsCliWorker::new(&self.worker, &settings.region).with_binary(&options.aws_binary);
        let status = AwsCliStatusSource::new(&settings.region).with_binary(&options.aws_binary);

        let report = DeploymentDriver::new(&worker, &status, settings)
            .deploy(&plan, self.stack_name.as_deref())
            .await?;

        println!(
            "{} Deployed {} stack(s) to {}",
            "✓".green(),
            report.outcomes.len(),
            plan.environment.bold()
        );
        Ok(())
    }
}
