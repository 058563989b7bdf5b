//! Application service — one-off maintenance tasks.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{ApiFailure, ProgressReporter, RunTaskRequest, TaskLauncher};
use crate::domain::task_definition::TOOL_NAME;
use crate::domain::{DeployError, OneOffTask, TaskDefinition};

/// Retry budget for tasks after the first.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed per task list; each `run_tasks` call starts a fresh budget.
    pub max_retries: u32,
    /// Delay before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 30,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Run `tasks` strictly in order against the registered definitions.
///
/// A start failure of the first task is fatal. Later tasks are retried after
/// `policy.backoff`, since an earlier task may still hold the capacity they
/// need; once `policy.max_retries` retries have been spent the run fails.
///
/// # Errors
///
/// Returns [`DeployError::OneOffTask`] on a fatal start failure, or
/// [`DeployError::UnregisteredDefinition`] if a task names an unknown or
/// unregistered unit.
pub async fn run_tasks(
    launcher: &impl TaskLauncher,
    reporter: &impl ProgressReporter,
    cluster: &str,
    definitions: &BTreeMap<String, TaskDefinition>,
    tasks: &[OneOffTask],
    policy: RetryPolicy,
) -> Result<()> {
    let mut retries = 0u32;

    for (index, task) in tasks.iter().enumerate() {
        let registered_name = definitions
            .get(&task.task_definition)
            .and_then(TaskDefinition::registered_name)
            .ok_or_else(|| DeployError::UnregisteredDefinition(task.task_definition.clone()))?;

        let request = RunTaskRequest {
            cluster: cluster.to_string(),
            task_definition: registered_name.clone(),
            container: task.container.clone(),
            command: task.command.args(),
            started_by: TOOL_NAME.to_string(),
        };

        loop {
            reporter.step(&format!(
                "Starting one-off task '{}' via {registered_name} ({})",
                task.command, task.container
            ));
            let failures = launcher.run_task(&request).await?;
            if failures.is_empty() {
                break;
            }

            let reason = describe_failures(&failures);
            reporter.error(&format!("Error starting one-off task: {reason}"));
            if index == 0 || retries >= policy.max_retries {
                return Err(DeployError::OneOffTask {
                    command: task.command.to_string(),
                    reason,
                }
                .into());
            }
            retries += 1;
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Ok(())
}

fn describe_failures(failures: &[ApiFailure]) -> String {
    failures
        .iter()
        .map(|f| match &f.arn {
            Some(arn) => format!("{} ({arn})", f.reason),
            None => f.reason.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
