//! Service rollout snapshots and per-wait event bookkeeping.
//!
//! Pure types. `RolloutRecord` lives for exactly one stability wait.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

/// Status the control plane gives the newest deployment of a service.
pub const PRIMARY: &str = "PRIMARY";

/// Status of a service that can be updated in place.
pub const ACTIVE: &str = "ACTIVE";

/// One deployment generation of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeployment {
    pub id: String,
    pub status: String,
    pub task_definition: String,
    pub desired_count: u32,
    pub pending_count: u32,
    pub running_count: u32,
}

/// A human-readable service event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// Point-in-time view of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub name: String,
    pub status: String,
    pub deployments: Vec<ServiceDeployment>,
    /// Events as returned by the control plane (any order).
    pub events: Vec<ServiceEvent>,
}

impl ServiceDescription {
    /// More than one deployment generation is still active.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.deployments.len() > 1
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE
    }

    /// `name (running+pending/desired)` from the PRIMARY deployment.
    #[must_use]
    pub fn summary(&self) -> String {
        self.deployments
            .iter()
            .find(|d| d.status == PRIMARY)
            .map_or_else(
                || self.name.clone(),
                |d| {
                    format!(
                        "{} ({}/{})",
                        self.name,
                        d.pending_count + d.running_count,
                        d.desired_count
                    )
                },
            )
    }
}

/// Event deduplication state for one stability wait.
///
/// Tracks a per-service cursor (newest surfaced timestamp) and every event
/// id already surfaced.
#[derive(Debug, Clone)]
pub struct RolloutRecord {
    cursors: HashMap<String, DateTime<Utc>>,
    seen: HashSet<String>,
    since: DateTime<Utc>,
}

impl RolloutRecord {
    /// Start tracking `services`, ignoring events at or before `since`.
    #[must_use]
    pub fn new<I, S>(services: I, since: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cursors: services.into_iter().map(|s| (s.into(), since)).collect(),
            seen: HashSet::new(),
            since,
        }
    }

    /// Events not surfaced before, newer than each service's cursor, oldest first.
    pub fn take_new_events(&mut self, services: &[ServiceDescription]) -> Vec<ServiceEvent> {
        let mut fresh = Vec::new();
        for service in services {
            let cursor = self
                .cursors
                .entry(service.name.clone())
                .or_insert(self.since);
            let mut newer: Vec<&ServiceEvent> = service
                .events
                .iter()
                .filter(|e| e.created_at > *cursor)
                .collect();
            newer.sort_by_key(|e| e.created_at);

            if let Some(last) = newer.last() {
                *cursor = last.created_at;
            }
            for event in newer {
                if self.seen.insert(event.id.clone()) {
                    fresh.push(event.clone());
                }
            }
        }
        fresh.sort_by_key(|e| e.created_at);
        fresh
    }
}
