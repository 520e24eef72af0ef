// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::command::{Command, PortMapping};

pub type ContainerName = String;
pub type TaskName = String;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// project_name = "shop"
///
/// [containers.db]
/// image = "postgres:16"
/// environment = { POSTGRES_PASSWORD = "secret" }
///
/// [containers.app]
/// build_directory = "app"
/// dependencies = ["db"]
///
/// [tasks.test]
/// prerequisites = ["lint"]
/// run = { container = "app", command = "cargo test" }
/// ```
///
/// This is the unvalidated shape; convert with `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Defaults to the name of the directory holding the config file.
    #[serde(default)]
    pub project_name: Option<String>,

    #[serde(default)]
    pub containers: BTreeMap<String, RawContainer>,

    #[serde(default)]
    pub tasks: BTreeMap<String, RawTask>,
}

/// `[containers.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawContainer {
    #[serde(default)]
    pub image: Option<String>,

    /// Build context; relative paths are resolved against the config file.
    #[serde(default)]
    pub build_directory: Option<PathBuf>,

    #[serde(default)]
    pub dockerfile: Option<String>,

    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub entrypoint: Option<String>,

    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// `"local:container"` pairs.
    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Run with `docker exec` after the container is healthy, in order.
    #[serde(default)]
    pub setup_commands: Vec<String>,

    #[serde(default)]
    pub run_as_current_user: RawRunAsCurrentUser,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRunAsCurrentUser {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub home_directory: Option<String>,
}

/// `[tasks.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTask {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub run: Option<RawTaskRun>,

    /// Extra containers to start alongside the task container.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Tasks to run first. `*` acts as a wildcard.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    #[serde(default)]
    pub customise: BTreeMap<String, RawCustomisation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTaskRun {
    pub container: String,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub entrypoint: Option<String>,

    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCustomisation {
    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub ports: Vec<String>,
}

/// Validated configuration. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub project_name: String,
    pub containers: BTreeMap<ContainerName, Container>,
    pub tasks: BTreeMap<TaskName, Task>,
}

impl ConfigFile {
    pub fn new(
        project_name: impl Into<String>,
        containers: impl IntoIterator<Item = Container>,
        tasks: impl IntoIterator<Item = Task>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            containers: containers.into_iter().map(|c| (c.name.clone(), c)).collect(),
            tasks: tasks.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.get(name)
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    pub name: ContainerName,
    pub image_source: ImageSource,
    pub command: Option<Command>,
    pub entrypoint: Option<Command>,
    pub working_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub port_mappings: BTreeSet<PortMapping>,
    pub dependencies: BTreeSet<ContainerName>,
    pub setup_commands: Vec<Command>,
    pub run_as_current_user: RunAsCurrentUser,
}

impl Container {
    pub fn new(name: impl Into<ContainerName>, image_source: ImageSource) -> Self {
        Self {
            name: name.into(),
            image_source,
            command: None,
            entrypoint: None,
            working_directory: None,
            environment: BTreeMap::new(),
            port_mappings: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            setup_commands: Vec::new(),
            run_as_current_user: RunAsCurrentUser::DefaultContainerUser,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageSource {
    Pull { image_name: String },
    Build(BuildImageSource),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildImageSource {
    pub build_directory: PathBuf,
    pub dockerfile: String,
    pub build_args: BTreeMap<String, String>,
}

impl BuildImageSource {
    pub fn new(build_directory: impl Into<PathBuf>) -> Self {
        Self {
            build_directory: build_directory.into(),
            dockerfile: "Dockerfile".to_string(),
            build_args: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunAsCurrentUser {
    DefaultContainerUser,
    CurrentUser { home_directory: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: TaskName,
    pub description: String,
    /// `None` for tasks that only group prerequisites.
    pub run_configuration: Option<TaskRunConfiguration>,
    pub dependencies: BTreeSet<ContainerName>,
    pub customisations: BTreeMap<ContainerName, TaskContainerCustomisation>,
    pub prerequisites: Vec<TaskName>,
}

impl Task {
    pub fn new(name: impl Into<TaskName>, run_configuration: Option<TaskRunConfiguration>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            run_configuration,
            dependencies: BTreeSet::new(),
            customisations: BTreeMap::new(),
            prerequisites: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskRunConfiguration {
    pub container: ContainerName,
    pub command: Option<Command>,
    pub entrypoint: Option<Command>,
    pub working_directory: Option<String>,
    pub additional_environment_variables: BTreeMap<String, String>,
    pub additional_port_mappings: BTreeSet<PortMapping>,
}

impl TaskRunConfiguration {
    pub fn new(container: impl Into<ContainerName>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }
}

/// Per-container overrides a task applies to one of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskContainerCustomisation {
    pub working_directory: Option<String>,
    pub additional_environment_variables: BTreeMap<String, String>,
    pub additional_port_mappings: BTreeSet<PortMapping>,
}
