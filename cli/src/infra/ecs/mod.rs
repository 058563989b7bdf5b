//! Infrastructure implementation of the cluster ports on the AWS SDK.
//!
//! `EcsClient` wraps `aws_sdk_ecs::Client`. Credentials and region come from
//! the standard AWS config chain (environment, profiles, SSO, IMDS); an
//! explicit endpoint URL points the client at an emulator.

mod payload;

use anyhow::Result;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_ecs::Client;
use aws_sdk_ecs::config::Region;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::{
    self as ecs, ContainerOverride, SortOrder, TaskDefinitionStatus, TaskOverride,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::application::ports::{
    ApiFailure, RunTaskRequest, ServiceLookup, ServiceManager, TaskDefinitionPage,
    TaskDefinitionRegistry, TaskLauncher,
};
use crate::domain::{Registration, ServiceDeployment, ServiceDescription, ServiceEvent, Tag};

use payload::register_input;

/// Region used when neither the flag nor the AWS config chain names one.
pub const DEFAULT_REGION: &str = "us-east-1";
const LIST_PAGE_SIZE: i32 = 100;

/// Errors from the ECS API.
#[derive(Debug, Error)]
pub enum EcsError {
    #[error("{action} failed: {message}")]
    Api {
        action: &'static str,
        message: String,
    },

    #[error("{action} response is missing {field}")]
    Incomplete {
        action: &'static str,
        field: &'static str,
    },

    #[error("invalid task definition field '{field}': {reason}")]
    Payload { field: String, reason: String },
}

fn api_error<E: std::error::Error>(action: &'static str) -> impl FnOnce(E) -> EcsError {
    move |err| {
        let message = DisplayErrorContext(err).to_string();
        tracing::debug!(action, %message, "ecs error");
        EcsError::Api { action, message }
    }
}

/// ECS control-plane client.
#[derive(Debug, Clone)]
pub struct EcsClient {
    client: Client,
}

impl EcsClient {
    /// Wrap an already configured SDK client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the standard AWS config chain.
    ///
    /// `region` takes precedence over the chain, which falls back to
    /// [`DEFAULT_REGION`]. `endpoint` overrides the regional endpoint.
    pub async fn from_env(region: Option<&str>, endpoint: Option<&str>) -> Self {
        let region = RegionProviderChain::first_try(region.map(|r| Region::new(r.to_string())))
            .or_default_provider()
            .or_else(DEFAULT_REGION);
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if let Some(url) = endpoint {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        tracing::debug!(region = ?config.region(), endpoint, "ecs client configured");
        Self::new(Client::new(&config))
    }
}

// ── SDK → domain ──────────────────────────────────────────────────────────────

fn to_utc(time: &aws_sdk_ecs::primitives::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos()).unwrap_or_default()
}

fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

fn service_description(service: &ecs::Service) -> ServiceDescription {
    ServiceDescription {
        name: service.service_name().unwrap_or_default().to_string(),
        status: service.status().unwrap_or_default().to_string(),
        deployments: service
            .deployments()
            .iter()
            .map(|d| ServiceDeployment {
                id: d.id().unwrap_or_default().to_string(),
                status: d.status().unwrap_or_default().to_string(),
                task_definition: d.task_definition().unwrap_or_default().to_string(),
                desired_count: to_count(d.desired_count()),
                pending_count: to_count(d.pending_count()),
                running_count: to_count(d.running_count()),
            })
            .collect(),
        events: service
            .events()
            .iter()
            .map(|e| ServiceEvent {
                id: e.id().unwrap_or_default().to_string(),
                created_at: e.created_at().map(to_utc).unwrap_or_default(),
                message: e.message().unwrap_or_default().to_string(),
            })
            .collect(),
    }
}

fn api_failure(failure: &ecs::Failure) -> ApiFailure {
    ApiFailure {
        arn: failure.arn().map(str::to_string),
        reason: failure.reason().unwrap_or_default().to_string(),
    }
}

// ── Port implementations ──────────────────────────────────────────────────────

impl TaskDefinitionRegistry for EcsClient {
    async fn register_task_definition(&self, payload: &Value) -> Result<Registration> {
        const ACTION: &str = "RegisterTaskDefinition";
        let output = register_input(payload)?
            .send_with(&self.client)
            .await
            .map_err(api_error(ACTION))?;
        let registered = output.task_definition().ok_or(EcsError::Incomplete {
            action: ACTION,
            field: "taskDefinition",
        })?;
        let arn = registered
            .task_definition_arn()
            .ok_or(EcsError::Incomplete {
                action: ACTION,
                field: "taskDefinitionArn",
            })?;
        tracing::debug!(arn, "registered task definition");
        Ok(Registration {
            family: registered.family().unwrap_or_default().to_string(),
            revision: to_count(registered.revision()),
            arn: arn.to_string(),
        })
    }

    async fn list_task_definitions(
        &self,
        family: &str,
        next_token: Option<&str>,
    ) -> Result<TaskDefinitionPage> {
        let output = self
            .client
            .list_task_definitions()
            .family_prefix(family)
            .status(TaskDefinitionStatus::Active)
            .sort(SortOrder::Asc)
            .max_results(LIST_PAGE_SIZE)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(api_error("ListTaskDefinitions"))?;
        Ok(TaskDefinitionPage {
            arns: output.task_definition_arns().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn deregister_task_definition(&self, arn: &str) -> Result<()> {
        self.client
            .deregister_task_definition()
            .task_definition(arn)
            .send()
            .await
            .map_err(api_error("DeregisterTaskDefinition"))?;
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<Vec<Tag>> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(api_error("ListTagsForResource"))?;
        Ok(output
            .tags()
            .iter()
            .map(|t| Tag {
                key: t.key().unwrap_or_default().to_string(),
                value: t.value().unwrap_or_default().to_string(),
            })
            .collect())
    }
}

impl ServiceManager for EcsClient {
    async fn describe_services(&self, cluster: &str, names: &[String]) -> Result<ServiceLookup> {
        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .set_services(Some(names.to_vec()))
            .send()
            .await
            .map_err(api_error("DescribeServices"))?;
        Ok(ServiceLookup {
            services: output.services().iter().map(service_description).collect(),
            failures: output.failures().iter().map(api_failure).collect(),
        })
    }

    async fn create_service(
        &self,
        cluster: &str,
        name: &str,
        task_definition: &str,
        desired_count: u32,
    ) -> Result<()> {
        self.client
            .create_service()
            .cluster(cluster)
            .service_name(name)
            .task_definition(task_definition)
            .desired_count(i32::try_from(desired_count).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(api_error("CreateService"))?;
        Ok(())
    }

    async fn update_service(
        &self,
        cluster: &str,
        name: &str,
        task_definition: &str,
    ) -> Result<()> {
        self.client
            .update_service()
            .cluster(cluster)
            .service(name)
            .task_definition(task_definition)
            .send()
            .await
            .map_err(api_error("UpdateService"))?;
        Ok(())
    }
}

impl TaskLauncher for EcsClient {
    async fn run_task(&self, request: &RunTaskRequest) -> Result<Vec<ApiFailure>> {
        let overrides = TaskOverride::builder()
            .container_overrides(
                ContainerOverride::builder()
                    .name(&request.container)
                    .set_command(Some(request.command.clone()))
                    .build(),
            )
            .build();
        let output = self
            .client
            .run_task()
            .cluster(&request.cluster)
            .task_definition(&request.task_definition)
            .overrides(overrides)
            .started_by(&request.started_by)
            .count(1)
            .send()
            .await
            .map_err(api_error("RunTask"))?;
        Ok(output.failures().iter().map(api_failure).collect())
    }
}
