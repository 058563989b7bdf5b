//! Loads the deployment config from a YAML file on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::DeployConfig;

/// A parsed config together with the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DeployConfig,
    pub base_dir: PathBuf,
}

/// Read and parse the config at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid config.
pub fn load_deploy_config(path: &Path) -> Result<LoadedConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let config: DeployConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    config
        .rollout
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tracing::debug!(path = %path.display(), units = config.task_definitions.len(), "loaded config");
    Ok(LoadedConfig { config, base_dir })
}
