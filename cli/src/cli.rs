//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Roll ECS services over to freshly built task definitions
#[derive(Parser)]
#[command(
    name = "ecs-rollout",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build task definitions and deploy them to the cluster
    Deploy(commands::deploy::DeployArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            quiet,
            no_color,
            command,
        } = self;
        match command {
            Command::Version => {
                commands::version::run();
                Ok(())
            }
            Command::Deploy(args) => {
                let ctx = OutputContext::new(no_color, quiet);
                commands::deploy::run(&ctx, &args).await
            }
        }
    }
}
