//! Application service — the end-to-end rollout.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Phases run strictly in sequence:
//! building → registering → pre-deploy tasks → service updates →
//! stability wait → post-deploy tasks → garbage collection.
//! Any fatal error ends the run; nothing is rolled back.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;

use crate::application::ports::{ClusterApi, LocalFs, ProgressReporter, ServiceManager};
use crate::application::services::builder::generate_task_definitions;
use crate::application::services::one_off::{RetryPolicy, run_tasks};
use crate::application::services::registration::{
    deregister_superseded, register_task_definitions,
};
use crate::application::services::stability::{PollPolicy, describe_all, wait_until_stable};
use crate::domain::{DeployConfig, DeployError, TaskDefinition};

/// Desired count for services created by a rollout.
pub const INITIAL_DESIRED_COUNT: u32 = 1;

/// Step of a deployment run, used to say where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Building,
    Registering,
    PreTasks,
    UpdatingServices,
    WaitingStable,
    PostTasks,
    GarbageCollecting,
    Done,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Building => "building",
            Self::Registering => "registering",
            Self::PreTasks => "pre-deploy tasks",
            Self::UpdatingServices => "updating services",
            Self::WaitingStable => "waiting for stability",
            Self::PostTasks => "post-deploy tasks",
            Self::GarbageCollecting => "garbage collection",
            Self::Done => "done",
        })
    }
}

/// Inputs to the building phase.
pub struct BuildOptions<'a> {
    /// Directory template paths are relative to.
    pub base_dir: &'a Path,
    pub template_vars: &'a BTreeMap<String, String>,
    /// Where to write `<unit>.json` artifacts, if anywhere.
    pub output_dir: Option<&'a Path>,
}

/// Rollout behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolloutOptions {
    /// Create services that do not exist yet instead of failing.
    pub create_missing_services: bool,
    pub poll: PollPolicy,
    pub retry: RetryPolicy,
}

/// Build every configured unit and check service references.
///
/// Dangling service references are reported, not raised: the rollout fails
/// on its own once it reaches the service.
///
/// # Errors
///
/// Returns the first build failure.
pub fn build_definitions(
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    opts: &BuildOptions<'_>,
) -> Result<BTreeMap<String, TaskDefinition>> {
    let definitions =
        generate_task_definitions(fs, config, opts.base_dir, opts.template_vars, opts.output_dir)
            .inspect_err(|e| {
                reporter.error(&format!("Deployment failed during {}: {e:#}", DeployPhase::Building));
            })?;

    for err in config.dangling_service_references() {
        reporter.error(&err.to_string());
    }
    if let Some(dir) = opts.output_dir {
        reporter.step(&format!(
            "Wrote {} task definitions to {}",
            definitions.len(),
            dir.display()
        ));
    }
    Ok(definitions)
}

/// Services configured but absent (or not ACTIVE) on the cluster.
///
/// # Errors
///
/// Returns an error if the services cannot be described.
pub async fn find_missing_services(
    services: &impl ServiceManager,
    cluster: &str,
    names: &[String],
) -> Result<Vec<String>> {
    let lookup = describe_all(services, cluster, names).await?;
    Ok(names
        .iter()
        .filter(|name| {
            !lookup
                .services
                .iter()
                .any(|s| &s.name == *name && s.is_active())
        })
        .cloned()
        .collect())
}

/// Roll the configured services over to freshly registered definitions.
///
/// `definitions` is updated in place with the registered identities.
///
/// # Errors
///
/// Returns the first fatal error, tagged with the phase it happened in.
/// Garbage collection failures are reported as warnings only.
pub async fn deploy(
    cluster: &impl ClusterApi,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    definitions: &mut BTreeMap<String, TaskDefinition>,
    opts: &RolloutOptions,
) -> Result<()> {
    // The missing-service pre-flight belongs to registration.
    let mut phase = DeployPhase::Registering;
    match run_phases(cluster, reporter, config, definitions, opts, &mut phase).await {
        Ok(()) => Ok(()),
        Err(err) => {
            reporter.error(&format!("Deployment failed during {phase}: {err:#}"));
            Err(err.context(format!("deployment failed during {phase}")))
        }
    }
}

async fn run_phases(
    cluster: &impl ClusterApi,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    definitions: &mut BTreeMap<String, TaskDefinition>,
    opts: &RolloutOptions,
    phase: &mut DeployPhase,
) -> Result<()> {
    let cluster_name = config.cluster_name.as_str();
    let service_names = config.service_names();
    reporter.step(&format!(
        "Starting deploy on cluster {cluster_name} ({} services)",
        service_names.len()
    ));

    // Creating services is normally left to infrastructure-as-code.
    let missing = find_missing_services(cluster, cluster_name, &service_names).await?;
    let may_create = opts.create_missing_services || config.create_missing_services;
    if !missing.is_empty() && !may_create {
        return Err(DeployError::MissingServices(missing).into());
    }

    register_task_definitions(cluster, reporter, definitions).await?;

    *phase = DeployPhase::PreTasks;
    run_tasks(
        cluster,
        reporter,
        cluster_name,
        definitions,
        &config.before_deploy,
        opts.retry,
    )
    .await?;

    *phase = DeployPhase::UpdatingServices;
    for (service_name, service) in &config.services {
        let registered_name = definitions
            .get(&service.task_definition)
            .ok_or_else(|| DeployError::ConfigReference {
                service: service_name.clone(),
                unit: service.task_definition.clone(),
            })?
            .registered_name()
            .ok_or_else(|| DeployError::UnregisteredDefinition(service.task_definition.clone()))?;

        if missing.contains(service_name) {
            reporter.step(&format!(
                "Creating new service {service_name} with task definition {registered_name}"
            ));
            cluster
                .create_service(
                    cluster_name,
                    service_name,
                    &registered_name,
                    INITIAL_DESIRED_COUNT,
                )
                .await?;
        } else {
            reporter.step(&format!(
                "Updating service {service_name} with task definition {registered_name}"
            ));
            cluster
                .update_service(cluster_name, service_name, &registered_name)
                .await?;
        }
    }

    *phase = DeployPhase::WaitingStable;
    let stable =
        wait_until_stable(cluster, reporter, cluster_name, &service_names, &opts.poll).await?;
    if !stable {
        return Err(DeployError::StabilizationTimeout.into());
    }

    *phase = DeployPhase::PostTasks;
    run_tasks(
        cluster,
        reporter,
        cluster_name,
        definitions,
        &config.after_deploy,
        opts.retry,
    )
    .await?;

    *phase = DeployPhase::GarbageCollecting;
    if let Err(err) = deregister_superseded(cluster, reporter, definitions).await {
        reporter.warn(&format!("Garbage collection failed: {err:#}"));
    }

    *phase = DeployPhase::Done;
    reporter.success(&format!("Deployment of cluster {cluster_name} complete"));
    Ok(())
}
