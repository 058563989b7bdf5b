//! Deploy command — build task definitions and roll services over to them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::application::ports::ProgressReporter;
use crate::application::services::deployment::{
    BuildOptions, RolloutOptions, build_definitions, deploy,
};
use crate::application::services::one_off::RetryPolicy;
use crate::application::services::stability::PollPolicy;
use crate::domain::parse_template_var;
use crate::infra::config::load_deploy_config;
use crate::infra::ecs::EcsClient;
use crate::infra::fs::StdFs;
use crate::output::{OutputContext, TerminalReporter};

/// Arguments for the deploy command.
#[derive(Args)]
pub struct DeployArgs {
    /// Deployment config (YAML)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Template variable, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_template_var)]
    pub vars: Vec<(String, String)>,

    /// Build and validate task definitions without touching the cluster
    #[arg(long)]
    pub dry_run: bool,

    /// Write each generated task definition to DIR/<name>.json
    #[arg(long, value_name = "DIR")]
    pub output_path: Option<PathBuf>,

    /// Create services that do not exist yet
    #[arg(long)]
    pub create_missing_services: bool,

    /// ECS API endpoint override, e.g. a local emulator
    #[arg(long, env = "ECS_ENDPOINT_URL")]
    pub endpoint: Option<String>,

    /// AWS region [default: from the AWS config chain, else us-east-1]
    #[arg(long)]
    pub region: Option<String>,
}

/// Entry point for `ecs-rollout deploy`.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, a definition cannot be
/// built, or the rollout fails.
pub async fn run(ctx: &OutputContext, args: &DeployArgs) -> Result<()> {
    let loaded = load_deploy_config(&args.config)?;
    let config = &loaded.config;
    let reporter = TerminalReporter::new(ctx);
    let template_vars: BTreeMap<String, String> = args.vars.iter().cloned().collect();

    let mut definitions = build_definitions(
        &StdFs,
        &reporter,
        config,
        &BuildOptions {
            base_dir: &loaded.base_dir,
            template_vars: &template_vars,
            output_dir: args.output_path.as_deref(),
        },
    )?;

    if args.dry_run {
        if let Some(err) = config.dangling_service_references().into_iter().next() {
            return Err(err.into());
        }
        reporter.success(&format!(
            "Dry run: built {} task definitions, nothing deployed",
            definitions.len()
        ));
        return Ok(());
    }

    let client = EcsClient::from_env(args.region.as_deref(), args.endpoint.as_deref()).await;
    let opts = RolloutOptions {
        create_missing_services: args.create_missing_services,
        poll: PollPolicy::from(&config.rollout),
        retry: RetryPolicy::default(),
    };

    deploy(&client, &reporter, config, &mut definitions, &opts).await
}
