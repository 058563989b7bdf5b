//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod merge;
pub mod rollout;
pub mod task_definition;
pub mod template;

pub use config::{CommandSpec, DeployConfig, OneOffTask, RolloutSettings, parse_template_var};
pub use error::{BuildError, ConfigError, DeployError};
pub use rollout::{RolloutRecord, ServiceDeployment, ServiceDescription, ServiceEvent};
pub use task_definition::{Registration, Tag, TaskDefinition};
