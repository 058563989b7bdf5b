//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::domain::{Registration, ServiceDescription, Tag};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Most service names the control plane accepts in one describe call.
pub const DESCRIBE_BATCH_SIZE: usize = 10;

// ── Value Types ───────────────────────────────────────────────────────────────

/// A failure entry reported by the control plane alongside a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub arn: Option<String>,
    pub reason: String,
}

/// Result of one describe-services call.
#[derive(Debug, Clone, Default)]
pub struct ServiceLookup {
    pub services: Vec<ServiceDescription>,
    pub failures: Vec<ApiFailure>,
}

/// One page of task definition ARNs for a family, oldest first.
#[derive(Debug, Clone, Default)]
pub struct TaskDefinitionPage {
    pub arns: Vec<String>,
    pub next_token: Option<String>,
}

/// Request to start an ephemeral task with a command override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTaskRequest {
    pub cluster: String,
    /// `family:revision` to run.
    pub task_definition: String,
    pub container: String,
    pub command: Vec<String>,
    pub started_by: String,
}

// ── Cluster Port Traits ───────────────────────────────────────────────────────

/// Task definition registration and housekeeping.
#[allow(async_fn_in_trait)]
pub trait TaskDefinitionRegistry {
    /// Register a new revision from a `RegisterTaskDefinition` request body.
    async fn register_task_definition(&self, payload: &Value) -> Result<Registration>;
    /// List active revisions of `family`, one page at a time.
    async fn list_task_definitions(
        &self,
        family: &str,
        next_token: Option<&str>,
    ) -> Result<TaskDefinitionPage>;
    /// Deregister one revision by ARN.
    async fn deregister_task_definition(&self, arn: &str) -> Result<()>;
    /// Read the tags of a task definition.
    async fn list_tags(&self, arn: &str) -> Result<Vec<Tag>>;
}

/// Service inspection and mutation.
#[allow(async_fn_in_trait)]
pub trait ServiceManager {
    /// Describe at most [`DESCRIBE_BATCH_SIZE`] services.
    async fn describe_services(&self, cluster: &str, names: &[String]) -> Result<ServiceLookup>;
    /// Create a service running `task_definition`.
    async fn create_service(
        &self,
        cluster: &str,
        name: &str,
        task_definition: &str,
        desired_count: u32,
    ) -> Result<()>;
    /// Point an existing service at `task_definition`.
    async fn update_service(&self, cluster: &str, name: &str, task_definition: &str)
    -> Result<()>;
}

/// Ephemeral task execution.
#[allow(async_fn_in_trait)]
pub trait TaskLauncher {
    /// Start one task. Start failures are returned, not raised.
    async fn run_task(&self, request: &RunTaskRequest) -> Result<Vec<ApiFailure>>;
}

/// Composite trait — any type implementing all three sub-traits is a `ClusterApi`.
pub trait ClusterApi: TaskDefinitionRegistry + ServiceManager + TaskLauncher {}

/// Blanket implementation: any type implementing all three sub-traits is a `ClusterApi`.
impl<T> ClusterApi for T where T: TaskDefinitionRegistry + ServiceManager + TaskLauncher {}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit an error message.
    fn error(&self, message: &str);
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Abstracts local filesystem access for templates and generated artifacts.
pub trait LocalFs {
    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Path) -> bool;
    /// Read a UTF-8 file.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Create a directory and its parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Write a file, replacing it.
    fn write(&self, path: &Path, contents: String) -> Result<()>;
}
