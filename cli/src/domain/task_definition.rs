//! Task definition model: a family of containers plus registration identity.
//!
//! Pure types and transformations. Templates are parsed from JSON documents
//! shaped like the `RegisterTaskDefinition` request; every field the model
//! does not type explicitly is carried through opaquely.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::domain::error::BuildError;
use crate::domain::merge::merge_value;
use crate::domain::template::substitute;

/// Tag key marking definitions created by this tool.
pub const CREATED_BY_TAG: &str = "createdBy";

/// Value of the [`CREATED_BY_TAG`] tag.
pub const TOOL_NAME: &str = "ecs-rollout";

/// Resource tag attached to a task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// The tag identifying definitions created by this tool.
    #[must_use]
    pub fn created_by() -> Self {
        Self {
            key: CREATED_BY_TAG.to_string(),
            value: TOOL_NAME.to_string(),
        }
    }
}

/// Returns `true` if `tags` mark a definition as created by this tool.
#[must_use]
pub fn is_created_by_tool(tags: &[Tag]) -> bool {
    tags.iter()
        .any(|t| t.key == CREATED_BY_TAG && t.value == TOOL_NAME)
}

/// Identity assigned by the control plane on registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub family: String,
    pub revision: u32,
    pub arn: String,
}

/// One container of a task definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub hostname: Option<String>,
    pub environment: BTreeMap<String, String>,
    /// Every other container field, in template order.
    pub fields: Map<String, Value>,
}

impl ContainerDefinition {
    fn from_template(value: Value, path: &str) -> Result<Self, BuildError> {
        let parse_err = |reason: String| BuildError::TemplateParse {
            path: path.to_string(),
            reason,
        };

        let Value::Object(mut fields) = value else {
            return Err(parse_err("container definition is not an object".into()));
        };

        let name = take_string(&mut fields, "name")
            .ok_or_else(|| parse_err("container definition without a name".into()))?;
        let image = take_string(&mut fields, "image")
            .ok_or_else(|| parse_err(format!("container '{name}' has no image")))?;
        let hostname = take_string(&mut fields, "hostname");
        let environment = match fields.shift_remove("environment") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(value) => environment_from_value(&value)
                .ok_or_else(|| parse_err(format!("container '{name}' has an invalid environment")))?,
        };

        Ok(Self {
            name,
            image,
            hostname,
            environment,
            fields,
        })
    }

    /// Apply one override field using the merge law.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidOverride`] when a typed field receives a
    /// value of the wrong shape.
    pub fn apply_override(&mut self, key: &str, value: Value) -> Result<(), BuildError> {
        let invalid = |reason: &str| BuildError::InvalidOverride {
            container: self.name.clone(),
            key: key.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "name" | "image" | "hostname" => {
                let Value::String(text) = value else {
                    return Err(invalid("expected a string"));
                };
                match key {
                    "name" => self.name = text,
                    "image" => self.image = text,
                    _ => self.hostname = Some(text),
                }
            }
            "environment" => {
                let extra = environment_from_value(&value)
                    .ok_or_else(|| invalid("expected a mapping"))?;
                self.environment.extend(extra);
            }
            _ => match self.fields.get_mut(key) {
                Some(slot) => *slot = merge_value(Some(slot.take()), value),
                None => {
                    self.fields.insert(key.to_string(), value);
                }
            },
        }
        Ok(())
    }

    fn to_payload(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".into(), Value::String(self.name.clone()));
        out.insert("image".into(), Value::String(self.image.clone()));
        if let Some(hostname) = &self.hostname {
            out.insert("hostname".into(), Value::String(hostname.clone()));
        }
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        // BTreeMap iteration keeps the pairs sorted by name.
        let environment = self
            .environment
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();
        out.insert("environment".into(), Value::Array(environment));
        Value::Object(out)
    }
}

/// A deployable unit: one family of containers.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub family: String,
    pub containers: Vec<ContainerDefinition>,
    pub task_role_arn: Option<String>,
    pub execution_role_arn: Option<String>,
    pub tags: Vec<Tag>,
    /// Every other top-level field (volumes, networkMode, ...), in template order.
    pub fields: Map<String, Value>,
    registration: Option<Registration>,
}

impl TaskDefinition {
    /// Parse a template document.
    ///
    /// `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::TemplateParse`] if the document is not valid
    /// JSON or does not describe at least one container.
    pub fn from_template_str(contents: &str, path: &str) -> Result<Self, BuildError> {
        let parse_err = |reason: String| BuildError::TemplateParse {
            path: path.to_string(),
            reason,
        };

        let value: Value = serde_json::from_str(contents).map_err(|e| parse_err(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(parse_err("template is not a JSON object".into()));
        };

        let family = take_string(&mut fields, "family").unwrap_or_default();
        let task_role_arn = take_string(&mut fields, "taskRoleArn");
        let execution_role_arn = take_string(&mut fields, "executionRoleArn");
        let tags = match fields.shift_remove("tags") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => tags_from_value(&value)
                .ok_or_else(|| parse_err("tags must be a list of {key, value}".into()))?,
        };

        let Some(Value::Array(raw_containers)) = fields.shift_remove("containerDefinitions") else {
            return Err(parse_err("missing containerDefinitions list".into()));
        };
        if raw_containers.is_empty() {
            return Err(parse_err("containerDefinitions is empty".into()));
        }
        let containers = raw_containers
            .into_iter()
            .map(|c| ContainerDefinition::from_template(c, path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            family,
            containers,
            task_role_arn,
            execution_role_arn,
            tags,
            fields,
            registration: None,
        })
    }

    /// Fill in default hostnames for containers that have none.
    ///
    /// A single container gets `<family>`; otherwise each container gets
    /// `<family>-<name>` with underscores turned into hyphens.
    pub fn assign_default_hostnames(&mut self) {
        let single = self.containers.len() == 1;
        for container in &mut self.containers {
            if container.hostname.is_some() {
                continue;
            }
            container.hostname = Some(default_hostname(&self.family, &container.name, single));
        }
    }

    /// Replace every container's environment.
    pub fn set_environment(&mut self, environment: &BTreeMap<String, String>) {
        for container in &mut self.containers {
            container.environment.clone_from(environment);
        }
    }

    /// Substitute template variables into every container image.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UndefinedVariable`] for the first unknown placeholder.
    pub fn apply_variables(&mut self, vars: &BTreeMap<String, String>) -> Result<(), BuildError> {
        for container in &mut self.containers {
            container.image =
                substitute(&container.image, vars).map_err(|name| BuildError::UndefinedVariable {
                    name,
                    container: container.name.clone(),
                })?;
        }
        Ok(())
    }

    /// Apply per-container overrides keyed by container name.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidOverride`] if a typed field gets a bad value.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, Map<String, Value>>,
    ) -> Result<(), BuildError> {
        for container in &mut self.containers {
            let Some(fields) = overrides.get(&container.name) else {
                continue;
            };
            for (key, value) in fields {
                container.apply_override(key, value.clone())?;
            }
        }
        Ok(())
    }

    /// Find a container by name.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Registration identity, if registered.
    #[must_use]
    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    #[must_use]
    pub fn revision(&self) -> Option<u32> {
        self.registration.as_ref().map(|r| r.revision)
    }

    #[must_use]
    pub fn arn(&self) -> Option<&str> {
        self.registration.as_ref().map(|r| r.arn.as_str())
    }

    /// `family:revision`, once registered.
    #[must_use]
    pub fn registered_name(&self) -> Option<String> {
        self.registration
            .as_ref()
            .map(|r| format!("{}:{}", r.family, r.revision))
    }

    /// Record the identity returned by the control plane.
    ///
    /// The family reported by the control plane wins.
    pub fn mark_registered(&mut self, registration: Registration) {
        self.family.clone_from(&registration.family);
        self.registration = Some(registration);
    }

    /// The `RegisterTaskDefinition` request body.
    ///
    /// Environments become `{name, value}` lists sorted by name, so equal
    /// inputs always serialize to identical bytes.
    #[must_use]
    pub fn registration_payload(&self) -> Value {
        let mut out = Map::new();
        out.insert("family".into(), Value::String(self.family.clone()));
        if let Some(arn) = &self.task_role_arn {
            out.insert("taskRoleArn".into(), Value::String(arn.clone()));
        }
        if let Some(arn) = &self.execution_role_arn {
            out.insert("executionRoleArn".into(), Value::String(arn.clone()));
        }
        out.insert(
            "containerDefinitions".into(),
            Value::Array(self.containers.iter().map(ContainerDefinition::to_payload).collect()),
        );
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        out.insert(
            "tags".into(),
            Value::Array(
                self.tags
                    .iter()
                    .map(|t| json!({"key": t.key, "value": t.value}))
                    .collect(),
            ),
        );
        Value::Object(out)
    }
}

impl std::fmt::Display for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.registered_name() {
            Some(name) => f.write_str(&name),
            None => write!(f, "{} (unregistered)", self.family),
        }
    }
}

/// Default hostname for a container.
#[must_use]
pub fn default_hostname(family: &str, container: &str, single: bool) -> String {
    if single {
        family.to_string()
    } else {
        format!("{family}-{}", container.replace('_', "-"))
    }
}

/// Render a scalar environment value the way the control plane stores it.
#[must_use]
pub fn stringify_env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.shift_remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            // Non-string values stay opaque.
            fields.insert(key.to_string(), other);
            None
        }
    }
}

/// Accepts either a `{KEY: value}` mapping or a `[{name, value}]` list.
fn environment_from_value(value: &Value) -> Option<BTreeMap<String, String>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), stringify_env_value(v)))
                .collect(),
        ),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let name = item.get("name")?.as_str()?.to_string();
                let value = item.get("value").map(stringify_env_value).unwrap_or_default();
                Some((name, value))
            })
            .collect(),
        _ => None,
    }
}

fn tags_from_value(value: &Value) -> Option<Vec<Tag>> {
    value
        .as_array()?
        .iter()
        .map(|item| {
            Some(Tag {
                key: item.get("key")?.as_str()?.to_string(),
                value: item.get("value")?.as_str()?.to_string(),
            })
        })
        .collect()
}
