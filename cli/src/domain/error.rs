//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while validating a loaded deployment config.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value} for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
}

// ── Build errors ──────────────────────────────────────────────────────────────

/// Errors raised while turning a template into a task definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Template not found: {path}")]
    TemplateNotFound { path: String },

    #[error("Cannot parse template {path}: {reason}")]
    TemplateParse { path: String, reason: String },

    #[error("Undefined variable '{name}' in image of container '{container}'")]
    UndefinedVariable { name: String, container: String },

    #[error("Task definition '{unit}' references unknown environment group '{group}'")]
    UnknownEnvironmentGroup { unit: String, group: String },

    #[error("Invalid override '{key}' for container '{container}': {reason}")]
    InvalidOverride {
        container: String,
        key: String,
        reason: String,
    },
}

// ── Deploy errors ─────────────────────────────────────────────────────────────

/// Errors raised by the rollout sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeployError {
    #[error("Missing task definition '{unit}' for service '{service}'")]
    ConfigReference { service: String, unit: String },

    #[error("The following services are missing: {}", .0.join(", "))]
    MissingServices(Vec<String>),

    #[error("Registering task definition '{unit}' failed: {reason}")]
    Registration { unit: String, reason: String },

    #[error("One-off task '{command}' failed to start: {reason}")]
    OneOffTask { command: String, reason: String },

    #[error("Timeout")]
    StabilizationTimeout,

    #[error("Task definition '{0}' has not been registered")]
    UnregisteredDefinition(String),
}
