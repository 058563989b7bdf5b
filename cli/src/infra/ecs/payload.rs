//! Conversion of a registration-shaped JSON document into an SDK request.
//!
//! Templates are plain ECS task definition JSON. Every field listed here is
//! mapped onto the typed `RegisterTaskDefinition` input; anything else is
//! rejected rather than silently dropped.

use std::collections::HashMap;

use aws_sdk_ecs::operation::register_task_definition::RegisterTaskDefinitionInput;
use aws_sdk_ecs::operation::register_task_definition::builders::RegisterTaskDefinitionInputBuilder;
use aws_sdk_ecs::types::{
    Compatibility, ContainerDefinition, HealthCheck, HostEntry, HostVolumeProperties, IpcMode,
    KeyValuePair, LogConfiguration, LogDriver, MountPoint, NetworkMode, PidMode, PortMapping,
    Secret, Tag, TaskDefinitionPlacementConstraint, TaskDefinitionPlacementConstraintType,
    TransportProtocol, Ulimit, UlimitName, Volume, VolumeFrom,
};
use serde_json::{Map, Value};

use super::EcsError;

const TASK_FIELDS: &[&str] = &[
    "family",
    "taskRoleArn",
    "executionRoleArn",
    "networkMode",
    "cpu",
    "memory",
    "requiresCompatibilities",
    "pidMode",
    "ipcMode",
    "volumes",
    "placementConstraints",
    "tags",
    "containerDefinitions",
];

const CONTAINER_FIELDS: &[&str] = &[
    "name",
    "image",
    "hostname",
    "environment",
    "command",
    "entryPoint",
    "essential",
    "cpu",
    "memory",
    "memoryReservation",
    "portMappings",
    "links",
    "workingDirectory",
    "user",
    "mountPoints",
    "volumesFrom",
    "logConfiguration",
    "dockerLabels",
    "privileged",
    "readonlyRootFilesystem",
    "disableNetworking",
    "extraHosts",
    "ulimits",
    "dnsServers",
    "dnsSearchDomains",
    "secrets",
    "stopTimeout",
    "startTimeout",
    "healthCheck",
];

/// Build the `RegisterTaskDefinition` input for `payload`.
///
/// # Errors
///
/// Returns [`EcsError::Payload`] for unsupported fields or values of the
/// wrong shape.
pub fn register_input(payload: &Value) -> Result<RegisterTaskDefinitionInputBuilder, EcsError> {
    let doc = object(payload, "task definition")?;
    reject_unknown(doc, TASK_FIELDS, "task definition")?;

    let containers = objects(doc, "containerDefinitions", "task definition")?
        .unwrap_or_default()
        .into_iter()
        .map(container_definition)
        .collect::<Result<Vec<_>, _>>()?;

    let volumes = objects(doc, "volumes", "task definition")?
        .map(|list| list.into_iter().map(volume).collect::<Result<Vec<_>, _>>())
        .transpose()?;

    let constraints = objects(doc, "placementConstraints", "task definition")?.map(|list| {
        list.into_iter()
            .map(|c| {
                Ok(TaskDefinitionPlacementConstraint::builder()
                    .set_type(
                        string(c, "type", "placementConstraints")?
                            .map(|t| TaskDefinitionPlacementConstraintType::from(t.as_str())),
                    )
                    .set_expression(string(c, "expression", "placementConstraints")?)
                    .build())
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let tags = objects(doc, "tags", "task definition")?.map(|list| {
        list.into_iter()
            .map(|t| {
                Ok(Tag::builder()
                    .set_key(string(t, "key", "tags")?)
                    .set_value(string(t, "value", "tags")?)
                    .build())
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    Ok(RegisterTaskDefinitionInput::builder()
        .set_family(string(doc, "family", "task definition")?)
        .set_task_role_arn(string(doc, "taskRoleArn", "task definition")?)
        .set_execution_role_arn(string(doc, "executionRoleArn", "task definition")?)
        .set_network_mode(
            string(doc, "networkMode", "task definition")?.map(|m| NetworkMode::from(m.as_str())),
        )
        .set_cpu(scalar_string(doc, "cpu", "task definition")?)
        .set_memory(scalar_string(doc, "memory", "task definition")?)
        .set_requires_compatibilities(
            strings(doc, "requiresCompatibilities", "task definition")?
                .map(|list| list.iter().map(|c| Compatibility::from(c.as_str())).collect()),
        )
        .set_pid_mode(string(doc, "pidMode", "task definition")?.map(|m| PidMode::from(m.as_str())))
        .set_ipc_mode(string(doc, "ipcMode", "task definition")?.map(|m| IpcMode::from(m.as_str())))
        .set_volumes(volumes)
        .set_placement_constraints(constraints.transpose()?)
        .set_tags(tags.transpose()?)
        .set_container_definitions(Some(containers)))
}

fn container_definition(c: &Map<String, Value>) -> Result<ContainerDefinition, EcsError> {
    let label = format!(
        "container {}",
        c.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
    );
    let ctx = label.as_str();
    reject_unknown(c, CONTAINER_FIELDS, ctx)?;

    let environment = objects(c, "environment", ctx)?.map(|list| {
        list.into_iter()
            .map(|pair| {
                Ok(KeyValuePair::builder()
                    .set_name(string(pair, "name", ctx)?)
                    .set_value(scalar_string(pair, "value", ctx)?)
                    .build())
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let port_mappings = objects(c, "portMappings", ctx)?.map(|list| {
        list.into_iter()
            .map(|p| {
                Ok(PortMapping::builder()
                    .set_container_port(int(p, "containerPort", ctx)?)
                    .set_host_port(int(p, "hostPort", ctx)?)
                    .set_protocol(
                        string(p, "protocol", ctx)?.map(|v| TransportProtocol::from(v.as_str())),
                    )
                    .build())
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let mount_points = objects(c, "mountPoints", ctx)?.map(|list| {
        list.into_iter()
            .map(|m| {
                Ok(MountPoint::builder()
                    .set_source_volume(string(m, "sourceVolume", ctx)?)
                    .set_container_path(string(m, "containerPath", ctx)?)
                    .set_read_only(boolean(m, "readOnly", ctx)?)
                    .build())
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let volumes_from = objects(c, "volumesFrom", ctx)?.map(|list| {
        list.into_iter()
            .map(|v| {
                Ok(VolumeFrom::builder()
                    .set_source_container(string(v, "sourceContainer", ctx)?)
                    .set_read_only(boolean(v, "readOnly", ctx)?)
                    .build())
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let extra_hosts = objects(c, "extraHosts", ctx)?.map(|list| {
        list.into_iter()
            .map(|h| {
                HostEntry::builder()
                    .set_hostname(string(h, "hostname", ctx)?)
                    .set_ip_address(string(h, "ipAddress", ctx)?)
                    .build()
                    .map_err(|e| invalid(ctx, "extraHosts", e))
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let ulimits = objects(c, "ulimits", ctx)?.map(|list| {
        list.into_iter()
            .map(|u| {
                Ulimit::builder()
                    .set_name(string(u, "name", ctx)?.map(|n| UlimitName::from(n.as_str())))
                    .set_soft_limit(int(u, "softLimit", ctx)?)
                    .set_hard_limit(int(u, "hardLimit", ctx)?)
                    .build()
                    .map_err(|e| invalid(ctx, "ulimits", e))
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let secrets = objects(c, "secrets", ctx)?.map(|list| {
        list.into_iter()
            .map(|s| {
                Secret::builder()
                    .set_name(string(s, "name", ctx)?)
                    .set_value_from(string(s, "valueFrom", ctx)?)
                    .build()
                    .map_err(|e| invalid(ctx, "secrets", e))
            })
            .collect::<Result<Vec<_>, EcsError>>()
    });

    let log_configuration = c
        .get("logConfiguration")
        .map(|v| {
            let log = object(v, ctx)?;
            LogConfiguration::builder()
                .set_log_driver(
                    string(log, "logDriver", ctx)?.map(|d| LogDriver::from(d.as_str())),
                )
                .set_options(string_map(log, "options", ctx)?)
                .build()
                .map_err(|e| invalid(ctx, "logConfiguration", e))
        })
        .transpose()?;

    let health_check = c
        .get("healthCheck")
        .map(|v| {
            let check = object(v, ctx)?;
            HealthCheck::builder()
                .set_command(strings(check, "command", ctx)?)
                .set_interval(int(check, "interval", ctx)?)
                .set_timeout(int(check, "timeout", ctx)?)
                .set_retries(int(check, "retries", ctx)?)
                .set_start_period(int(check, "startPeriod", ctx)?)
                .build()
                .map_err(|e| invalid(ctx, "healthCheck", e))
        })
        .transpose()?;

    Ok(ContainerDefinition::builder()
        .set_name(string(c, "name", ctx)?)
        .set_image(string(c, "image", ctx)?)
        .set_hostname(string(c, "hostname", ctx)?)
        .set_environment(environment.transpose()?)
        .set_command(strings(c, "command", ctx)?)
        .set_entry_point(strings(c, "entryPoint", ctx)?)
        .set_essential(boolean(c, "essential", ctx)?)
        .set_cpu(int(c, "cpu", ctx)?)
        .set_memory(int(c, "memory", ctx)?)
        .set_memory_reservation(int(c, "memoryReservation", ctx)?)
        .set_port_mappings(port_mappings.transpose()?)
        .set_links(strings(c, "links", ctx)?)
        .set_working_directory(string(c, "workingDirectory", ctx)?)
        .set_user(string(c, "user", ctx)?)
        .set_mount_points(mount_points.transpose()?)
        .set_volumes_from(volumes_from.transpose()?)
        .set_log_configuration(log_configuration)
        .set_docker_labels(string_map(c, "dockerLabels", ctx)?)
        .set_privileged(boolean(c, "privileged", ctx)?)
        .set_readonly_root_filesystem(boolean(c, "readonlyRootFilesystem", ctx)?)
        .set_disable_networking(boolean(c, "disableNetworking", ctx)?)
        .set_extra_hosts(extra_hosts.transpose()?)
        .set_ulimits(ulimits.transpose()?)
        .set_dns_servers(strings(c, "dnsServers", ctx)?)
        .set_dns_search_domains(strings(c, "dnsSearchDomains", ctx)?)
        .set_secrets(secrets.transpose()?)
        .set_stop_timeout(int(c, "stopTimeout", ctx)?)
        .set_start_timeout(int(c, "startTimeout", ctx)?)
        .set_health_check(health_check)
        .build())
}

fn volume(v: &Map<String, Value>) -> Result<Volume, EcsError> {
    let host = v
        .get("host")
        .map(|h| {
            let host = object(h, "volumes")?;
            Ok::<_, EcsError>(
                HostVolumeProperties::builder()
                    .set_source_path(string(host, "sourcePath", "volumes")?)
                    .build(),
            )
        })
        .transpose()?;
    Ok(Volume::builder()
        .set_name(string(v, "name", "volumes")?)
        .set_host(host)
        .build())
}

// ── Field readers ─────────────────────────────────────────────────────────────

fn invalid(ctx: &str, field: &str, reason: impl std::fmt::Display) -> EcsError {
    EcsError::Payload {
        field: format!("{ctx}: {field}"),
        reason: reason.to_string(),
    }
}

fn reject_unknown(obj: &Map<String, Value>, known: &[&str], ctx: &str) -> Result<(), EcsError> {
    match obj.keys().find(|k| !known.contains(&k.as_str())) {
        Some(key) => Err(invalid(ctx, key, "unsupported field")),
        None => Ok(()),
    }
}

fn object<'a>(value: &'a Value, ctx: &str) -> Result<&'a Map<String, Value>, EcsError> {
    value
        .as_object()
        .ok_or_else(|| invalid(ctx, "<document>", "expected an object"))
}

/// Present, non-null field.
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn string(obj: &Map<String, Value>, name: &str, ctx: &str) -> Result<Option<String>, EcsError> {
    field(obj, name)
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(ctx, name, "expected a string"))
        })
        .transpose()
}

/// Strings, numbers and booleans, rendered as strings.
fn scalar_string(
    obj: &Map<String, Value>,
    name: &str,
    ctx: &str,
) -> Result<Option<String>, EcsError> {
    field(obj, name)
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(invalid(ctx, name, "expected a scalar")),
        })
        .transpose()
}

fn int(obj: &Map<String, Value>, name: &str, ctx: &str) -> Result<Option<i32>, EcsError> {
    field(obj, name)
        .map(|v| {
            v.as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| invalid(ctx, name, "expected an integer"))
        })
        .transpose()
}

fn boolean(obj: &Map<String, Value>, name: &str, ctx: &str) -> Result<Option<bool>, EcsError> {
    field(obj, name)
        .map(|v| {
            v.as_bool()
                .ok_or_else(|| invalid(ctx, name, "expected a boolean"))
        })
        .transpose()
}

fn strings(
    obj: &Map<String, Value>,
    name: &str,
    ctx: &str,
) -> Result<Option<Vec<String>>, EcsError> {
    field(obj, name)
        .map(|v| {
            v.as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .map(|i| i.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| invalid(ctx, name, "expected a list of strings"))
        })
        .transpose()
}

fn string_map(
    obj: &Map<String, Value>,
    name: &str,
    ctx: &str,
) -> Result<Option<HashMap<String, String>>, EcsError> {
    field(obj, name)
        .map(|v| {
            v.as_object()
                .and_then(|map| {
                    map.iter()
                        .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect::<Option<HashMap<_, _>>>()
                })
                .ok_or_else(|| invalid(ctx, name, "expected a map of strings"))
        })
        .transpose()
}

fn objects<'a>(
    obj: &'a Map<String, Value>,
    name: &str,
    ctx: &str,
) -> Result<Option<Vec<&'a Map<String, Value>>>, EcsError> {
    field(obj, name)
        .map(|v| {
            v.as_array()
                .and_then(|items| items.iter().map(Value::as_object).collect::<Option<Vec<_>>>())
                .ok_or_else(|| invalid(ctx, name, "expected a list of objects"))
        })
        .transpose()
}
