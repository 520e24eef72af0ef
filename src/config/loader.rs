// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DockyardError, Result};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        DockyardError::ConfigError(format!("The configuration file '{}' could not be read: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// On top of [`load_from_path`] this:
///
/// - defaults `project_name` to the name of the config file's directory,
/// - resolves relative `build_directory` entries against that directory,
/// - converts into a [`ConfigFile`], parsing commands and port mappings.
///
/// Container and task references are checked later, per task, by the graph
/// builder and the execution order resolver.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    let base_dir = config_base_dir(path);

    if raw_config.project_name.is_none() {
        raw_config.project_name = project_name_from_dir(&base_dir);
    }

    for container in raw_config.containers.values_mut() {
        if let Some(dir) = container.build_directory.as_mut() {
            if dir.is_relative() {
                *dir = base_dir.join(&*dir);
            }
        }
    }

    let config = ConfigFile::try_from(raw_config)?;
    debug!(
        project = %config.project_name,
        containers = config.containers.len(),
        tasks = config.tasks.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Default config file location: `dockyard.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("dockyard.toml")
}

fn config_base_dir(config_path: &Path) -> PathBuf {
    let parent = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::canonicalize(&parent).unwrap_or(parent)
}

fn project_name_from_dir(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_lowercase())
}
