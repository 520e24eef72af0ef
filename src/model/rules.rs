// src/model/rules.rs

//! Readiness rules. A stage holds one rule per step it may still emit; a
//! rule turns into a concrete [`TaskStep`] once the event log satisfies it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::model::{BuildImageSource, Container, ContainerName, ImageSource};
use crate::dag::overrides::ContainerRuntimeConfiguration;
use crate::model::events::EventLog;
use crate::model::resources::{DockerContainer, DockerNetwork};
use crate::model::steps::TaskStep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStepRuleEvaluationResult {
    Ready(TaskStep),
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStepRule {
    // Run stage.
    CreateTaskNetwork,
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
        image_source: ImageSource,
        all_containers_in_network: BTreeSet<ContainerName>,
    },
    StartContainer {
        container: ContainerName,
        dependencies: BTreeSet<ContainerName>,
    },
    RunContainer {
        container: ContainerName,
        dependencies: BTreeSet<ContainerName>,
    },
    WaitForContainerToBecomeHealthy {
        container: ContainerName,
    },
    RunSetupCommands {
        container: Container,
        config: ContainerRuntimeConfiguration,
    },

    // Cleanup stage.
    StopContainer {
        container: ContainerName,
        docker_container: DockerContainer,
        containers_that_must_be_stopped_first: BTreeSet<ContainerName>,
    },
    RemoveContainer {
        container: ContainerName,
        docker_container: DockerContainer,
        container_was_started: bool,
    },
    DeleteTemporaryFile {
        path: PathBuf,
        container_that_must_be_removed_first: Option<ContainerName>,
    },
    DeleteTemporaryDirectory {
        path: PathBuf,
        container_that_must_be_removed_first: Option<ContainerName>,
    },
    DeleteTaskNetwork {
        network: DockerNetwork,
        containers_that_must_be_removed_first: BTreeSet<ContainerName>,
    },
}

use TaskStepRuleEvaluationResult::{NotReady, Ready};

impl TaskStepRule {
    pub fn evaluate(&self, events: &EventLog) -> TaskStepRuleEvaluationResult {
        match self {
            TaskStepRule::CreateTaskNetwork => Ready(TaskStep::PrepareTaskNetwork),

            TaskStepRule::BuildImage { source, image_tags } => Ready(TaskStep::BuildImage {
                source: source.clone(),
                image_tags: image_tags.clone(),
            }),

            TaskStepRule::PullImage { image_name } => Ready(TaskStep::PullImage {
                image_name: image_name.clone(),
            }),

            TaskStepRule::CreateContainer {
                container,
                config,
                is_task_container,
                image_source,
                all_containers_in_network,
            } => {
                let image = match image_source {
                    ImageSource::Pull { image_name } => events.pulled_image(image_name),
                    ImageSource::Build(source) => events.built_image(source),
                };

                match (image, events.network()) {
                    (Some(image), Some(network)) => Ready(TaskStep::CreateContainer {
                        container: container.clone(),
                        config: config.clone(),
                        is_task_container: *is_task_container,
                        image: image.clone(),
                        network: network.clone(),
                        all_containers_in_network: all_containers_in_network.clone(),
                    }),
                    _ => NotReady,
                }
            }

            TaskStepRule::StartContainer {
                container,
                dependencies,
            } => match ready_to_start(events, container, dependencies) {
                Some(docker_container) => Ready(TaskStep::StartContainer {
                    container: container.clone(),
                    docker_container: docker_container.clone(),
                }),
                None => NotReady,
            },

            TaskStepRule::RunContainer {
                container,
                dependencies,
            } => match ready_to_start(events, container, dependencies) {
                Some(docker_container) => Ready(TaskStep::RunContainer {
                    container: container.clone(),
                    docker_container: docker_container.clone(),
                }),
                None => NotReady,
            },

            TaskStepRule::WaitForContainerToBecomeHealthy { container } => {
                match events.created_container(container) {
                    Some(docker_container) if events.container_started(container) => {
                        Ready(TaskStep::WaitForContainerToBecomeHealthy {
                            container: container.clone(),
                            docker_container: docker_container.clone(),
                        })
                    }
                    _ => NotReady,
                }
            }

            TaskStepRule::RunSetupCommands { container, config } => {
                match events.created_container(&container.name) {
                    Some(docker_container) if events.container_became_healthy(&container.name) => {
                        Ready(TaskStep::RunSetupCommands {
                            container: container.clone(),
                            config: config.clone(),
                            docker_container: docker_container.clone(),
                        })
                    }
                    _ => NotReady,
                }
            }

            TaskStepRule::StopContainer {
                container,
                docker_container,
                containers_that_must_be_stopped_first,
            } => {
                if containers_that_must_be_stopped_first
                    .iter()
                    .all(|c| events.container_stopped(c))
                {
                    Ready(TaskStep::StopContainer {
                        container: container.clone(),
                        docker_container: docker_container.clone(),
                    })
                } else {
                    NotReady
                }
            }

            TaskStepRule::RemoveContainer {
                container,
                docker_container,
                container_was_started,
            } => {
                if *container_was_started && !events.container_stopped(container) {
                    NotReady
                } else {
                    Ready(TaskStep::RemoveContainer {
                        container: container.clone(),
                        docker_container: docker_container.clone(),
                    })
                }
            }

            TaskStepRule::DeleteTemporaryFile {
                path,
                container_that_must_be_removed_first,
            } => {
                if removed(events, container_that_must_be_removed_first.as_deref()) {
                    Ready(TaskStep::DeleteTemporaryFile { path: path.clone() })
                } else {
                    NotReady
                }
            }

            TaskStepRule::DeleteTemporaryDirectory {
                path,
                container_that_must_be_removed_first,
            } => {
                if removed(events, container_that_must_be_removed_first.as_deref()) {
                    Ready(TaskStep::DeleteTemporaryDirectory { path: path.clone() })
                } else {
                    NotReady
                }
            }

            TaskStepRule::DeleteTaskNetwork {
                network,
                containers_that_must_be_removed_first,
            } => {
                if containers_that_must_be_removed_first
                    .iter()
                    .all(|c| events.container_removed(c))
                {
                    Ready(TaskStep::DeleteTaskNetwork {
                        network: network.clone(),
                    })
                } else {
                    NotReady
                }
            }
        }
    }

    /// The shell command a human would run to do this rule's work by hand,
    /// for rules that release a resource.
    pub fn manual_cleanup_command(&self) -> Option<String> {
        match self {
            TaskStepRule::RemoveContainer {
                docker_container, ..
            } => Some(format!("docker rm --force --volumes {}", docker_container.id)),
            TaskStepRule::DeleteTemporaryFile { path, .. } => {
                Some(format!("rm {}", path.display()))
            }
            TaskStepRule::DeleteTemporaryDirectory { path, .. } => {
                Some(format!("rm -rf {}", path.display()))
            }
            TaskStepRule::DeleteTaskNetwork { network, .. } => {
                Some(format!("docker network rm {}", network.id))
            }
            _ => None,
        }
    }

    /// Containers before temporary paths before the network.
    pub fn manual_cleanup_sort_order(&self) -> u8 {
        match self {
            TaskStepRule::RemoveContainer { .. } => 1,
            TaskStepRule::DeleteTemporaryFile { .. }
            | TaskStepRule::DeleteTemporaryDirectory { .. } => 2,
            TaskStepRule::DeleteTaskNetwork { .. } => 3,
            _ => 0,
        }
    }
}

fn ready_to_start<'e>(
    events: &'e EventLog,
    container: &str,
    dependencies: &BTreeSet<ContainerName>,
) -> Option<&'e DockerContainer> {
    let docker_container = events.created_container(container)?;

    if dependencies.iter().all(|d| events.container_became_ready(d)) {
        Some(docker_container)
    } else {
        None
    }
}

fn removed(events: &EventLog, container: Option<&str>) -> bool {
    container.is_none_or(|c| events.container_removed(c))
}
