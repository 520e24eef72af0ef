// src/model/events.rs

use std::path::{Path, PathBuf};

use crate::config::command::Command;
use crate::config::model::{BuildImageSource, ContainerName};
use crate::model::resources::{DockerContainer, DockerImage, DockerNetwork};
use crate::model::steps::TaskStep;

/// Something that happened during a task run.
///
/// Every step ends with exactly one terminal event, either a success
/// variant or [`TaskEvent::Failed`], and may post informational progress
/// events along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    TaskNetworkCreated {
        network: DockerNetwork,
    },
    TaskNetworkDeleted,
    ImageBuilt {
        source: BuildImageSource,
        image: DockerImage,
    },
    ImageBuildProgress {
        source: BuildImageSource,
        message: String,
    },
    ImagePulled {
        image_name: String,
        image: DockerImage,
    },
    ImagePullProgress {
        image_name: String,
        message: String,
    },
    ContainerCreated {
        container: ContainerName,
        docker_container: DockerContainer,
    },
    ContainerStarted {
        container: ContainerName,
    },
    ContainerBecameHealthy {
        container: ContainerName,
    },
    RunningSetupCommand {
        container: ContainerName,
        command: Command,
        index: usize,
    },
    /// Healthy and all setup commands done; dependents may start.
    ContainerBecameReady {
        container: ContainerName,
    },
    RunningContainerExited {
        container: ContainerName,
        exit_code: i64,
    },
    ContainerStopped {
        container: ContainerName,
    },
    ContainerRemoved {
        container: ContainerName,
    },
    TemporaryFileCreated {
        container: ContainerName,
        path: PathBuf,
    },
    TemporaryFileDeleted {
        path: PathBuf,
    },
    TemporaryDirectoryCreated {
        container: ContainerName,
        path: PathBuf,
    },
    TemporaryDirectoryDeleted {
        path: PathBuf,
    },
    StepStarting {
        step: TaskStep,
    },
    Failed(TaskFailure),
}

/// Failure variants. Any of these moves the task into its failure path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    ExecutionFailed {
        message: String,
    },
    TaskNetworkCreationFailed {
        message: String,
    },
    ImageBuildFailed {
        source: BuildImageSource,
        message: String,
    },
    ImagePullFailed {
        image_name: String,
        message: String,
    },
    ContainerCreationFailed {
        container: ContainerName,
        message: String,
    },
    ContainerStartFailed {
        container: ContainerName,
        message: String,
    },
    ContainerDidNotBecomeHealthy {
        container: ContainerName,
        message: String,
    },
    ContainerRunFailed {
        container: ContainerName,
        message: String,
    },
    SetupCommandExecutionError {
        container: ContainerName,
        command: Command,
        message: String,
    },
    SetupCommandFailed {
        container: ContainerName,
        command: Command,
        exit_code: i64,
        output: String,
    },
    ContainerStopFailed {
        container: ContainerName,
        message: String,
    },
    ContainerRemovalFailed {
        container: ContainerName,
        message: String,
    },
    TaskNetworkDeletionFailed {
        message: String,
    },
    TemporaryFileDeletionFailed {
        path: PathBuf,
        message: String,
    },
    TemporaryDirectoryDeletionFailed {
        path: PathBuf,
        message: String,
    },
    UserInterruptedExecution,
}

impl TaskEvent {
    pub fn execution_failed(message: impl Into<String>) -> Self {
        TaskEvent::Failed(TaskFailure::ExecutionFailed {
            message: message.into(),
        })
    }

    /// Informational events are shown to the user but never change what
    /// the scheduler does next.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            TaskEvent::ImageBuildProgress { .. }
                | TaskEvent::ImagePullProgress { .. }
                | TaskEvent::RunningSetupCommand { .. }
                | TaskEvent::StepStarting { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskEvent::Failed(_))
    }
}

impl From<TaskFailure> for TaskEvent {
    fn from(failure: TaskFailure) -> Self {
        TaskEvent::Failed(failure)
    }
}

/// Every event posted during one task run, in arrival order.
///
/// Insert-only: duplicates are ignored and nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<TaskEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if an identical event was already recorded.
    pub fn add(&mut self, event: TaskEvent) -> bool {
        if self.events.contains(&event) {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event: &TaskEvent) -> bool {
        self.events.contains(event)
    }

    pub fn to_vec(&self) -> Vec<TaskEvent> {
        self.events.clone()
    }

    pub fn has_failure(&self) -> bool {
        self.events.iter().any(TaskEvent::is_failure)
    }

    pub fn network(&self) -> Option<&DockerNetwork> {
        self.events.iter().find_map(|e| match e {
            TaskEvent::TaskNetworkCreated { network } => Some(network),
            _ => None,
        })
    }

    pub fn built_image(&self, source: &BuildImageSource) -> Option<&DockerImage> {
        self.events.iter().find_map(|e| match e {
            TaskEvent::ImageBuilt { source: s, image } if s == source => Some(image),
            _ => None,
        })
    }

    pub fn pulled_image(&self, image_name: &str) -> Option<&DockerImage> {
        self.events.iter().find_map(|e| match e {
            TaskEvent::ImagePulled { image_name: n, image } if n == image_name => Some(image),
            _ => None,
        })
    }

    pub fn created_container(&self, container: &str) -> Option<&DockerContainer> {
        self.events.iter().find_map(|e| match e {
            TaskEvent::ContainerCreated {
                container: c,
                docker_container,
            } if c == container => Some(docker_container),
            _ => None,
        })
    }

    pub fn any_container_created(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TaskEvent::ContainerCreated { .. }))
    }

    /// Containers created so far, in creation order.
    pub fn created_containers(&self) -> Vec<(&str, &DockerContainer)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::ContainerCreated {
                    container,
                    docker_container,
                } => Some((container.as_str(), docker_container)),
                _ => None,
            })
            .collect()
    }

    pub fn container_started(&self, container: &str) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TaskEvent::ContainerStarted { container: c } if c == container))
    }

    pub fn container_became_healthy(&self, container: &str) -> bool {
        self.events.iter().any(
            |e| matches!(e, TaskEvent::ContainerBecameHealthy { container: c } if c == container),
        )
    }

    pub fn container_became_ready(&self, container: &str) -> bool {
        self.events.iter().any(
            |e| matches!(e, TaskEvent::ContainerBecameReady { container: c } if c == container),
        )
    }

    pub fn container_stopped(&self, container: &str) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TaskEvent::ContainerStopped { container: c } if c == container))
    }

    pub fn container_removed(&self, container: &str) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TaskEvent::ContainerRemoved { container: c } if c == container))
    }

    pub fn exit_code_of(&self, container: &str) -> Option<i64> {
        self.events.iter().find_map(|e| match e {
            TaskEvent::RunningContainerExited {
                container: c,
                exit_code,
            } if c == container => Some(*exit_code),
            _ => None,
        })
    }

    pub fn temporary_files(&self) -> Vec<(&str, &Path)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::TemporaryFileCreated { container, path } => {
                    Some((container.as_str(), path.as_path()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn temporary_directories(&self) -> Vec<(&str, &Path)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::TemporaryDirectoryCreated { container, path } => {
                    Some((container.as_str(), path.as_path()))
                }
                _ => None,
            })
            .collect()
    }
}
