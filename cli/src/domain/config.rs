//! Domain types and validators for the deployment config.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{BuildError, ConfigError, DeployError};
use crate::domain::task_definition::stringify_env_value;

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level deployment config, usually loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub cluster_name: String,
    /// Default environment for every container.
    #[serde(default)]
    pub environment: BTreeMap<String, Value>,
    /// Named environments layered on top of the default one.
    #[serde(default)]
    pub environment_groups: BTreeMap<String, BTreeMap<String, Value>>,
    pub task_definitions: BTreeMap<String, UnitConfig>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub before_deploy: Vec<OneOffTask>,
    #[serde(default)]
    pub after_deploy: Vec<OneOffTask>,
    /// Allow creating services that do not exist yet.
    #[serde(default)]
    pub create_missing_services: bool,
    #[serde(default)]
    pub rollout: RolloutSettings,
}

/// One deployable unit (task definition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Template path, relative to the config file.
    pub template: String,
    #[serde(default)]
    pub environment_group: Option<String>,
    /// Container name → field → value.
    #[serde(default)]
    pub overrides: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub task_role_arn: Option<String>,
    #[serde(default)]
    pub execution_role_arn: Option<String>,
}

/// A service and the unit it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub task_definition: String,
}

/// A maintenance command run once around the rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneOffTask {
    /// Unit whose registered definition runs the command.
    pub task_definition: String,
    pub container: String,
    pub command: CommandSpec,
}

/// A one-off command, either as a shell-like string or an argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Args(Vec<String>),
}

impl CommandSpec {
    /// Argument vector sent as the container command override.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Line(line) => line.split_whitespace().map(str::to_owned).collect(),
            Self::Args(args) => args.clone(),
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(line) => f.write_str(line),
            Self::Args(args) => f.write_str(&args.join(" ")),
        }
    }
}

/// Stability polling settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutSettings {
    pub settle_secs: u64,
    pub poll_interval_secs: u64,
    pub confirm_secs: u64,
    pub quiet_secs: u64,
    pub timeout_secs: u64,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            settle_secs: 5,
            poll_interval_secs: 5,
            confirm_secs: 5,
            quiet_secs: 10,
            timeout_secs: 15 * 60,
        }
    }
}

impl RolloutSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The poll interval and ceiling must be positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("rollout.poll_interval_secs", self.poll_interval_secs),
            ("rollout.timeout_secs", self.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must be at least 1",
                });
            }
        }
        Ok(())
    }
}

impl DeployConfig {
    /// Resolved environment for a unit: defaults overlaid with its group.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownEnvironmentGroup`] if the group is not defined.
    pub fn environment_for(&self, unit: &str) -> Result<BTreeMap<String, String>, BuildError> {
        let mut env: BTreeMap<String, String> = self
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), stringify_env_value(v)))
            .collect();

        let group = self
            .task_definitions
            .get(unit)
            .and_then(|u| u.environment_group.as_deref());
        if let Some(group) = group {
            let values = self.environment_groups.get(group).ok_or_else(|| {
                BuildError::UnknownEnvironmentGroup {
                    unit: unit.to_string(),
                    group: group.to_string(),
                }
            })?;
            env.extend(values.iter().map(|(k, v)| (k.clone(), stringify_env_value(v))));
        }
        Ok(env)
    }

    /// Every service that names a unit which is not configured.
    #[must_use]
    pub fn dangling_service_references(&self) -> Vec<DeployError> {
        self.services
            .iter()
            .filter(|(_, svc)| !self.task_definitions.contains_key(&svc.task_definition))
            .map(|(name, svc)| DeployError::ConfigReference {
                service: name.clone(),
                unit: svc.task_definition.clone(),
            })
            .collect()
    }

    /// Configured service names, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Parses a `KEY=VALUE` template variable.
///
/// # Errors
///
/// Returns an error if there is no `=` or the key is not an identifier.
pub fn parse_template_var(raw: &str) -> Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("{raw} is not a valid key/value string"));
    };
    if !IDENTIFIER_RE.is_match(key) {
        return Err(format!("{key} is not a valid identifier"));
    }
    Ok((key.to_string(), value.to_string()))
}

// ── Unit tests ───────────────────────────────────────────────────────────────
