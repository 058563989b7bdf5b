//! Application service — wait for service rollouts to stabilize.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Time is measured with `tokio::time` so tests can pause the clock.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tokio::time::Instant;

use crate::application::ports::{
    DESCRIBE_BATCH_SIZE, ProgressReporter, ServiceLookup, ServiceManager,
};
use crate::domain::{RolloutRecord, RolloutSettings, ServiceDescription};

/// Timing of the stability wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Grace period before the first poll.
    pub settle_delay: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// How long "nothing in progress" must hold before declaring success.
    pub confirm_window: Duration,
    /// Silence after which a "still waiting" summary is emitted.
    pub quiet_period: Duration,
    /// Ceiling measured from the start of the poll loop.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&RolloutSettings::default())
    }
}

impl From<&RolloutSettings> for PollPolicy {
    fn from(settings: &RolloutSettings) -> Self {
        Self {
            settle_delay: Duration::from_secs(settings.settle_secs),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            confirm_window: Duration::from_secs(settings.confirm_secs),
            quiet_period: Duration::from_secs(settings.quiet_secs),
            timeout: settings.timeout(),
        }
    }
}

/// Describe any number of services, batching by [`DESCRIBE_BATCH_SIZE`].
///
/// # Errors
///
/// Returns an error if any batch fails.
pub async fn describe_all(
    services: &impl ServiceManager,
    cluster: &str,
    names: &[String],
) -> Result<ServiceLookup> {
    let mut lookup = ServiceLookup::default();
    for batch in names.chunks(DESCRIBE_BATCH_SIZE) {
        let page = services
            .describe_services(cluster, batch)
            .await
            .with_context(|| format!("describing services {}", batch.join(", ")))?;
        lookup.services.extend(page.services);
        lookup.failures.extend(page.failures);
    }
    Ok(lookup)
}

/// Poll until no service has more than one deployment, or time runs out.
///
/// Returns `Ok(true)` once "nothing in progress" has held for the whole
/// confirmation window, `Ok(false)` when the timeout is reached first.
/// New service events are reported as they appear, oldest first.
///
/// # Errors
///
/// Returns an error only if describing services fails.
pub async fn wait_until_stable(
    services: &impl ServiceManager,
    reporter: &impl ProgressReporter,
    cluster: &str,
    names: &[String],
    policy: &PollPolicy,
) -> Result<bool> {
    if names.is_empty() {
        return Ok(true);
    }

    reporter.step("Waiting for deployments");
    tokio::time::sleep(policy.settle_delay).await;

    let lookback = chrono::Duration::from_std(policy.settle_delay).unwrap_or_default();
    let since = Utc::now() - lookback;
    let mut record = RolloutRecord::new(names.iter().cloned(), since);
    let start = Instant::now();
    let mut last_feedback = start;
    let mut settled_since: Option<Instant> = None;

    loop {
        let lookup = describe_all(services, cluster, names).await?;

        for event in record.take_new_events(&lookup.services) {
            reporter.step(&format!(
                "{} - {}",
                event.created_at.with_timezone(&Local).format("%H:%M:%S"),
                event.message
            ));
            last_feedback = Instant::now();
        }

        let in_progress: Vec<&ServiceDescription> = lookup
            .services
            .iter()
            .filter(|s| s.is_in_progress())
            .collect();
        let now = Instant::now();

        if in_progress.is_empty() {
            match settled_since {
                Some(at) if now.duration_since(at) >= policy.confirm_window => {
                    let summary: Vec<String> =
                        lookup.services.iter().map(ServiceDescription::summary).collect();
                    reporter.success(&format!("Deployment finished: {}", summary.join(", ")));
                    return Ok(true);
                }
                Some(_) => {}
                None => settled_since = Some(now),
            }
        } else {
            // A second deployment reappeared: restart the confirmation window.
            settled_since = None;
            if now.duration_since(last_feedback) >= policy.quiet_period {
                let waiting: Vec<&str> = in_progress.iter().map(|s| s.name.as_str()).collect();
                reporter.step(&format!("Still waiting for: {}", waiting.join(", ")));
                last_feedback = now;
            }
        }

        let remaining = policy.timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(policy.poll_interval.min(remaining)).await;
        if start.elapsed() >= policy.timeout {
            break;
        }
    }

    reporter.error(&format!("Giving up after {}", humanize(policy.timeout)));
    Ok(false)
}

fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 1 => format!("{minutes} minutes"),
        _ => format!("{secs} seconds"),
    }
}
