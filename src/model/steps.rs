// src/model/steps.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::config::model::{BuildImageSource, Container, ContainerName};
use crate::dag::overrides::ContainerRuntimeConfiguration;
use crate::model::resources::{DockerContainer, DockerImage, DockerNetwork};

/// One unit of work for the step executor. Produced by a stage when its
/// rule is satisfied, then consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStep {
    PrepareTaskNetwork,
    BuildImage {
        source: BuildImageSource,
        image_tags: BTreeSet<String>,
    },
    PullImage {
        image_name: String,
    },
    CreateContainer {
        container: Container,
        config: ContainerRuntimeConfiguration,
        is_task_container: bool,
        image: DockerImage,
        network: DockerNetwork,
        all_containers_in_network: BTreeSet<ContainerName>,
    },
    /// Start a dependency container in the background.
    StartContainer {
        container: ContainerName,
        docker_container: DockerContainer,
    },
    /// Start the task container attached and wait for it to exit.
    RunContainer {
        container: ContainerName,
        docker_container: DockerContainer,
    },
    WaitForContainerToBecomeHealthy {
        container: ContainerName,
        docker_container: DockerContainer,
    },
    RunSetupCommands {
        container: Container,
        config: ContainerRuntimeConfiguration,
        docker_container: DockerContainer,
    },
    StopContainer {
        container: ContainerName,
        docker_container: DockerContainer,
    },
    RemoveContainer {
        container: ContainerName,
        docker_container: DockerContainer,
    },
    DeleteTemporaryFile {
        path: PathBuf,
    },
    DeleteTemporaryDirectory {
        path: PathBuf,
    },
    DeleteTaskNetwork {
        network: DockerNetwork,
    },
}

impl TaskStep {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskStep::PrepareTaskNetwork => "PrepareTaskNetwork",
            TaskStep::BuildImage { .. } => "BuildImage",
            TaskStep::PullImage { .. } => "PullImage",
            TaskStep::CreateContainer { .. } => "CreateContainer",
            TaskStep::StartContainer { .. } => "StartContainer",
            TaskStep::RunContainer { .. } => "RunContainer",
            TaskStep::WaitForContainerToBecomeHealthy { .. } => "WaitForContainerToBecomeHealthy",
            TaskStep::RunSetupCommands { .. } => "RunSetupCommands",
            TaskStep::StopContainer { .. } => "StopContainer",
            TaskStep::RemoveContainer { .. } => "RemoveContainer",
            TaskStep::DeleteTemporaryFile { .. } => "DeleteTemporaryFile",
            TaskStep::DeleteTemporaryDirectory { .. } => "DeleteTemporaryDirectory",
            TaskStep::DeleteTaskNetwork { .. } => "DeleteTaskNetwork",
        }
    }

    /// The container this step acts on, if any.
    pub fn container_name(&self) -> Option<&str> {
        match self {
            TaskStep::CreateContainer { container, .. }
            | TaskStep::RunSetupCommands { container, .. } => Some(&container.name),
            TaskStep::StartContainer { container, .. }
            | TaskStep::RunContainer { container, .. }
            | TaskStep::WaitForContainerToBecomeHealthy { container, .. }
            | TaskStep::StopContainer { container, .. }
            | TaskStep::RemoveContainer { container, .. } => Some(container),
            TaskStep::PrepareTaskNetwork
            | TaskStep::BuildImage { .. }
            | TaskStep::PullImage { .. }
            | TaskStep::DeleteTemporaryFile { .. }
            | TaskStep::DeleteTemporaryDirectory { .. }
            | TaskStep::DeleteTaskNetwork { .. } => None,
        }
    }
}

impl fmt::Display for TaskStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStep::BuildImage { source, .. } => {
                write!(f, "{}({})", self.kind(), source.build_directory.display())
            }
            TaskStep::PullImage { image_name } => write!(f, "{}({image_name})", self.kind()),
            TaskStep::DeleteTemporaryFile { path } | TaskStep::DeleteTemporaryDirectory { path } => {
                write!(f, "{}({})", self.kind(), path.display())
            }
            TaskStep::DeleteTaskNetwork { network } => write!(f, "{}({network})", self.kind()),
            other => match other.container_name() {
                Some(container) => write!(f, "{}({container})", other.kind()),
                None => f.write_str(other.kind()),
            },
        }
    }
}
