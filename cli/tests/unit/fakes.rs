//! Shared in-memory fakes for service tests.
//!
//! `FakeCluster` keeps just enough control-plane state (services, task
//! definition revisions, tags) for whole deployment runs to be replayed
//! without a network, and logs every call it receives.

#![allow(clippy::expect_used, dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use ecs_rollout::application::ports::{
    ApiFailure, LocalFs, ProgressReporter, RunTaskRequest, ServiceLookup, ServiceManager,
    TaskDefinitionPage, TaskDefinitionRegistry, TaskLauncher,
};
use ecs_rollout::domain::{Registration, ServiceDeployment, ServiceDescription, ServiceEvent, Tag};
use serde_json::Value;

// ── Builders ──────────────────────────────────────────────────────────────────

fn deployment(id: &str, status: &str, desired: u32) -> ServiceDeployment {
    ServiceDeployment {
        id: id.to_string(),
        status: status.to_string(),
        task_definition: String::new(),
        desired_count: desired,
        pending_count: 0,
        running_count: desired,
    }
}

/// An ACTIVE service with a single PRIMARY deployment.
pub fn stable_service(name: &str) -> ServiceDescription {
    ServiceDescription {
        name: name.to_string(),
        status: "ACTIVE".to_string(),
        deployments: vec![deployment("ecs-svc/primary", "PRIMARY", 1)],
        events: Vec::new(),
    }
}

/// An ACTIVE service still replacing an older deployment.
pub fn rolling_service(name: &str) -> ServiceDescription {
    let mut service = stable_service(name);
    service
        .deployments
        .push(deployment("ecs-svc/previous", "ACTIVE", 1));
    service
}

pub fn event(id: &str, created_at: DateTime<Utc>, message: &str) -> ServiceEvent {
    ServiceEvent {
        id: id.to_string(),
        created_at,
        message: message.to_string(),
    }
}

pub fn failure(reason: &str) -> ApiFailure {
    ApiFailure {
        arn: None,
        reason: reason.to_string(),
    }
}

// ── Fake: cluster ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeRevision {
    pub arn: String,
    pub revision: u32,
    pub tags: Vec<Tag>,
}

#[derive(Default)]
struct ClusterState {
    services: BTreeMap<String, ServiceDescription>,
    /// Scripted describe snapshots, one per call; the last one repeats.
    frames: VecDeque<Vec<ServiceDescription>>,
    revisions: BTreeMap<String, Vec<FakeRevision>>,
    next_revision: BTreeMap<String, u32>,
    run_results: VecDeque<Vec<ApiFailure>>,
    run_requests: Vec<RunTaskRequest>,
    payloads: Vec<Value>,
    calls: Vec<String>,
    describe_batches: Vec<usize>,
    page_size: usize,
    fail_registration: bool,
    fail_listing: bool,
}

/// Stateful stand-in for the cluster control plane.
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClusterState {
                page_size: 100,
                ..ClusterState::default()
            }),
        }
    }

    /// A cluster already running `names`, all stable.
    pub fn with_services(names: &[&str]) -> Self {
        let cluster = Self::new();
        for name in names {
            cluster.add_service(stable_service(name));
        }
        cluster
    }

    pub fn add_service(&self, service: ServiceDescription) {
        self.lock().services.insert(service.name.clone(), service);
    }

    /// Queue describe snapshots; once drained, the last one keeps being served.
    pub fn script_describe(&self, frames: Vec<Vec<ServiceDescription>>) {
        self.lock().frames = frames.into();
    }

    /// Queue results for successive `run_task` calls; unscripted calls succeed.
    pub fn script_run_results(&self, results: Vec<Vec<ApiFailure>>) {
        self.lock().run_results = results.into();
    }

    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = size;
    }

    pub fn fail_registration(&self) {
        self.lock().fail_registration = true;
    }

    pub fn fail_listing(&self) {
        self.lock().fail_listing = true;
    }

    /// Seed an existing revision of `family`.
    pub fn seed_revision(&self, family: &str, tags: Vec<Tag>) -> String {
        let mut state = self.lock();
        push_revision(&mut state, family, tags)
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn revision_arns(&self, family: &str) -> Vec<String> {
        self.lock()
            .revisions
            .get(family)
            .map(|revs| revs.iter().map(|r| r.arn.clone()).collect())
            .unwrap_or_default()
    }

    pub fn run_requests(&self) -> Vec<RunTaskRequest> {
        self.lock().run_requests.clone()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.lock().payloads.clone()
    }

    pub fn describe_batches(&self) -> Vec<usize> {
        self.lock().describe_batches.clone()
    }

    pub fn service(&self, name: &str) -> Option<ServiceDescription> {
        self.lock().services.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClusterState> {
        self.state.lock().expect("lock")
    }
}

fn push_revision(state: &mut ClusterState, family: &str, tags: Vec<Tag>) -> String {
    let counter = state.next_revision.entry(family.to_string()).or_insert(0);
    *counter += 1;
    let revision = *counter;
    let arn = format!("arn:aws:ecs:us-east-1:000000000000:task-definition/{family}:{revision}");
    state
        .revisions
        .entry(family.to_string())
        .or_default()
        .push(FakeRevision {
            arn: arn.clone(),
            revision,
            tags,
        });
    arn
}

fn tags_of(payload: &Value) -> Vec<Tag> {
    payload["tags"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .map(|t| Tag {
                    key: t["key"].as_str().unwrap_or_default().to_string(),
                    value: t["value"].as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl TaskDefinitionRegistry for FakeCluster {
    async fn register_task_definition(&self, payload: &Value) -> Result<Registration> {
        let mut state = self.lock();
        let family = payload["family"].as_str().unwrap_or_default().to_string();
        state.calls.push(format!("register {family}"));
        if state.fail_registration {
            bail!("ClientException: Container.image should not be null or empty");
        }
        state.payloads.push(payload.clone());
        let arn = push_revision(&mut state, &family, tags_of(payload));
        let revision = state.next_revision[&family];
        Ok(Registration {
            family,
            revision,
            arn,
        })
    }

    async fn list_task_definitions(
        &self,
        family: &str,
        next_token: Option<&str>,
    ) -> Result<TaskDefinitionPage> {
        let mut state = self.lock();
        state.calls.push(format!("list {family}"));
        if state.fail_listing {
            bail!("ThrottlingException: Rate exceeded");
        }
        let start = next_token.map_or(Ok(0), |t| t.parse::<usize>())?;
        let all: Vec<String> = state
            .revisions
            .get(family)
            .map(|revs| revs.iter().map(|r| r.arn.clone()).collect())
            .unwrap_or_default();
        let end = (start + state.page_size).min(all.len());
        Ok(TaskDefinitionPage {
            arns: all[start..end].to_vec(),
            next_token: (end < all.len()).then(|| end.to_string()),
        })
    }

    async fn deregister_task_definition(&self, arn: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("deregister {arn}"));
        for revisions in state.revisions.values_mut() {
            revisions.retain(|r| r.arn != arn);
        }
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<Vec<Tag>> {
        let mut state = self.lock();
        state.calls.push(format!("tags {arn}"));
        Ok(state
            .revisions
            .values()
            .flatten()
            .find(|r| r.arn == arn)
            .map(|r| r.tags.clone())
            .unwrap_or_default())
    }
}

impl ServiceManager for FakeCluster {
    async fn describe_services(&self, _cluster: &str, names: &[String]) -> Result<ServiceLookup> {
        let mut state = self.lock();
        state.calls.push(format!("describe {}", names.join(",")));
        state.describe_batches.push(names.len());

        let snapshot: Vec<ServiceDescription> = if state.frames.len() > 1 {
            state.frames.pop_front().unwrap_or_default()
        } else if let Some(frame) = state.frames.front() {
            frame.clone()
        } else {
            state.services.values().cloned().collect()
        };

        let mut lookup = ServiceLookup::default();
        for name in names {
            match snapshot.iter().find(|s| &s.name == name) {
                Some(service) => lookup.services.push(service.clone()),
                None => lookup.failures.push(ApiFailure {
                    arn: Some(format!("arn:aws:ecs:us-east-1:000000000000:service/{name}")),
                    reason: "MISSING".to_string(),
                }),
            }
        }
        Ok(lookup)
    }

    async fn create_service(
        &self,
        _cluster: &str,
        name: &str,
        task_definition: &str,
        desired_count: u32,
    ) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("create {name} {task_definition} x{desired_count}"));
        let mut service = stable_service(name);
        service.deployments[0].task_definition = task_definition.to_string();
        service.deployments[0].desired_count = desired_count;
        service.deployments[0].running_count = desired_count;
        state.services.insert(name.to_string(), service);
        Ok(())
    }

    async fn update_service(&self, _cluster: &str, name: &str, task_definition: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("update {name} {task_definition}"));
        match state.services.get_mut(name) {
            Some(service) => {
                service.deployments[0].task_definition = task_definition.to_string();
                Ok(())
            }
            None => bail!("ServiceNotFoundException: Service not found."),
        }
    }
}

impl TaskLauncher for FakeCluster {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<Vec<ApiFailure>> {
        let mut state = self.lock();
        state.calls.push(format!(
            "run_task {} {}",
            request.task_definition,
            request.command.join(" ")
        ));
        state.run_requests.push(request.clone());
        Ok(state.run_results.pop_front().unwrap_or_default())
    }
}

// ── Fake: progress reporter ───────────────────────────────────────────────────

/// Captures every reported line as `"<level>: <message>"`.
#[derive(Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lock").clone()
    }

    pub fn messages(&self, level: &str) -> Vec<String> {
        let prefix = format!("{level}: ");
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }

    fn push(&self, level: &str, message: &str) {
        self.lines
            .lock()
            .expect("lock")
            .push(format!("{level}: {message}"));
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.push("step", message);
    }
    fn success(&self, message: &str) {
        self.push("success", message);
    }
    fn warn(&self, message: &str) {
        self.push("warn", message);
    }
    fn error(&self, message: &str) {
        self.push("error", message);
    }
}

// ── Fake: filesystem ──────────────────────────────────────────────────────────

/// In-memory `LocalFs`.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryFs {
    pub fn with_file(path: &str, contents: &str) -> Self {
        let fs = Self::default();
        fs.insert(path, contents);
        fs
    }

    pub fn insert(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .expect("lock")
            .insert(PathBuf::from(path), contents.to_string());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().expect("lock").get(Path::new(path)).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.lock().expect("lock").contains(Path::new(path))
    }
}

impl LocalFs for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("lock").contains_key(path)
            || self.dirs.lock().expect("lock").contains(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.files.lock().expect("lock").get(path) {
            Some(contents) => Ok(contents.clone()),
            None => bail!("no such file: {}", path.display()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.dirs.lock().expect("lock").insert(path.to_path_buf());
        Ok(())
    }

    fn write(&self, path: &Path, contents: String) -> Result<()> {
        self.files
            .lock()
            .expect("lock")
            .insert(path.to_path_buf(), contents);
        Ok(())
    }
}
