//! Filesystem infrastructure — implements `LocalFs` over `std::fs`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::LocalFs;

/// Production implementation of `LocalFs`.
pub struct StdFs;

impl LocalFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("cannot create {}", path.display()))
    }

    fn write(&self, path: &Path, contents: String) -> Result<()> {
        std::fs::write(path, contents).with_context(|| format!("cannot write {}", path.display()))
    }
}
