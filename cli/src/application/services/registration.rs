//! Application service — task definition registration and garbage collection.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::application::ports::{ProgressReporter, TaskDefinitionRegistry};
use crate::domain::task_definition::is_created_by_tool;
use crate::domain::{DeployError, TaskDefinition};

/// Most revisions inspected per family during one collection pass.
pub const MAX_INSPECTED_REVISIONS: usize = 10;

/// Register every definition, recording the returned identity in place.
///
/// One call per unit, no retry.
///
/// # Errors
///
/// Returns [`DeployError::Registration`] on the first failed registration.
pub async fn register_task_definitions(
    registry: &impl TaskDefinitionRegistry,
    reporter: &impl ProgressReporter,
    definitions: &mut BTreeMap<String, TaskDefinition>,
) -> Result<()> {
    for (unit, definition) in definitions.iter_mut() {
        let registration = registry
            .register_task_definition(&definition.registration_payload())
            .await
            .map_err(|e| DeployError::Registration {
                unit: unit.clone(),
                reason: format!("{e:#}"),
            })?;
        definition.mark_registered(registration);
        reporter.step(&format!("Registered new task definition {definition}"));
    }
    Ok(())
}

/// Outcome of one collection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub deregistered: Vec<String>,
    /// Revisions skipped because this tool did not create them.
    pub foreign: Vec<String>,
}

/// Deregister superseded revisions of each registered family.
///
/// Only revisions tagged as created by this tool are removed, and never the
/// revision just registered. At most [`MAX_INSPECTED_REVISIONS`] are
/// inspected per family; the rest wait for a later run.
///
/// # Errors
///
/// Returns an error if a definition is unregistered or a remote call fails.
pub async fn deregister_superseded(
    registry: &impl TaskDefinitionRegistry,
    reporter: &impl ProgressReporter,
    definitions: &BTreeMap<String, TaskDefinition>,
) -> Result<CollectionReport> {
    reporter.step("Deregistering old task definitions");
    let mut report = CollectionReport::default();

    for (unit, definition) in definitions {
        let current = definition
            .registration()
            .ok_or_else(|| DeployError::UnregisteredDefinition(unit.clone()))?;
        reporter.step(&format!(" - {}", current.family));

        let candidates = list_family(registry, &current.family).await?;
        for arn in candidates {
            if arn == current.arn {
                continue;
            }
            let tags = registry
                .list_tags(&arn)
                .await
                .with_context(|| format!("reading tags of {arn}"))?;
            if !is_created_by_tool(&tags) {
                tracing::debug!(%arn, "skipping revision not created by this tool");
                report.foreign.push(arn);
                continue;
            }
            registry
                .deregister_task_definition(&arn)
                .await
                .with_context(|| format!("deregistering {arn}"))?;
            tracing::debug!(%arn, "deregistered task definition");
            report.deregistered.push(arn);
        }
    }

    Ok(report)
}

/// Follow pagination until exhausted or the inspection cap is reached.
async fn list_family(registry: &impl TaskDefinitionRegistry, family: &str) -> Result<Vec<String>> {
    let mut arns = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = registry
            .list_task_definitions(family, token.as_deref())
            .await
            .with_context(|| format!("listing task definitions of {family}"))?;
        for arn in page.arns {
            if arns.len() == MAX_INSPECTED_REVISIONS {
                return Ok(arns);
            }
            arns.push(arn);
        }
        match page.next_token {
            Some(next) if arns.len() < MAX_INSPECTED_REVISIONS => token = Some(next),
            _ => return Ok(arns),
        }
    }
}
