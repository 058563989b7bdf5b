//! Application service — task definition generation.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Template reads and artifact writes go through the injected `LocalFs`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::application::ports::LocalFs;
use crate::domain::task_definition::Tag;
use crate::domain::{BuildError, DeployConfig, TaskDefinition};

/// Everything needed to materialize one unit.
pub struct BuildSpec<'a> {
    pub unit_name: &'a str,
    pub environment: &'a BTreeMap<String, String>,
    pub template_vars: &'a BTreeMap<String, String>,
    pub overrides: &'a BTreeMap<String, Map<String, Value>>,
    pub task_role_arn: Option<&'a str>,
    pub execution_role_arn: Option<&'a str>,
}

/// Build a task definition from template contents.
///
/// Steps, in order: family, role ARNs, default hostnames, environment,
/// image variables, overrides, creation tag.
///
/// # Errors
///
/// Returns a [`BuildError`] if the template is malformed, a variable is
/// undefined, or an override does not fit its field.
pub fn build_from_template(
    contents: &str,
    path: &str,
    spec: &BuildSpec<'_>,
) -> Result<TaskDefinition, BuildError> {
    let mut definition = TaskDefinition::from_template_str(contents, path)?;

    definition.family = spec.unit_name.to_string();
    if let Some(arn) = spec.task_role_arn {
        definition.task_role_arn = Some(arn.to_string());
    }
    if let Some(arn) = spec.execution_role_arn {
        definition.execution_role_arn = Some(arn.to_string());
    }

    definition.assign_default_hostnames();
    definition.set_environment(spec.environment);
    definition.apply_variables(spec.template_vars)?;
    definition.apply_overrides(spec.overrides)?;
    definition.tags = vec![Tag::created_by()];

    Ok(definition)
}

/// Load a template from disk and build it.
///
/// # Errors
///
/// Returns [`BuildError::TemplateNotFound`] if the file does not exist, or
/// any error from [`build_from_template`].
pub fn build_task_definition(
    fs: &impl LocalFs,
    template_path: &Path,
    spec: &BuildSpec<'_>,
) -> Result<TaskDefinition> {
    let display = template_path.display().to_string();
    if !fs.exists(template_path) {
        return Err(BuildError::TemplateNotFound { path: display }.into());
    }
    let contents = fs
        .read_to_string(template_path)
        .with_context(|| format!("reading template {display}"))?;
    Ok(build_from_template(&contents, &display, spec)?)
}

/// Build one definition per configured unit.
///
/// Template paths are resolved against `base_dir`. When `output_dir` is
/// given, each definition is also written there as `<unit>.json`.
///
/// # Errors
///
/// Returns the first build or write failure.
pub fn generate_task_definitions(
    fs: &impl LocalFs,
    config: &DeployConfig,
    base_dir: &Path,
    template_vars: &BTreeMap<String, String>,
    output_dir: Option<&Path>,
) -> Result<BTreeMap<String, TaskDefinition>> {
    let mut definitions = BTreeMap::new();

    for (name, unit) in &config.task_definitions {
        let environment = config.environment_for(name)?;
        let spec = BuildSpec {
            unit_name: name,
            environment: &environment,
            template_vars,
            overrides: &unit.overrides,
            task_role_arn: unit.task_role_arn.as_deref(),
            execution_role_arn: unit.execution_role_arn.as_deref(),
        };
        let template_path = base_dir.join(&unit.template);
        let definition = build_task_definition(fs, &template_path, &spec)
            .with_context(|| format!("building task definition '{name}'"))?;

        if let Some(dir) = output_dir {
            write_task_definition(fs, dir, name, &definition)?;
        }
        definitions.insert(name.clone(), definition);
    }

    Ok(definitions)
}

/// Write the registration-shaped JSON for one unit to `<dir>/<name>.json`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_task_definition(
    fs: &impl LocalFs,
    dir: &Path,
    name: &str,
    definition: &TaskDefinition,
) -> Result<PathBuf> {
    fs.create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{name}.json"));
    let mut body = serde_json::to_string_pretty(&definition.registration_payload())
        .context("serializing task definition")?;
    body.push('\n');
    fs.write(&path, body)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
