use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dockyard::config::model::RunAsCurrentUser;
use dockyard::errors::{Cancelled, DockyardError, Result};
use dockyard::exec::backend::{StepExecutor, StepRunContext};
use dockyard::model::events::{TaskEvent, TaskFailure};
use dockyard::model::resources::{DockerContainer, DockerImage, DockerNetwork};
use dockyard::model::steps::TaskStep;

/// What the fake does when it meets a matching step.
#[derive(Debug, Clone)]
enum Behaviour {
    /// Post the failure event for the step instead of its success event.
    Fail,
    /// Return an error without posting anything.
    Error(String),
    Panic,
    /// Wait for the task to be cancelled, then return `Cancelled`.
    BlockUntilCancelled,
    /// Sleep before behaving normally.
    Delay(Duration),
}

/// Key identifying a step: its kind and, for container steps, the container.
type StepKey = (String, Option<String>);

fn key_for(step: &TaskStep) -> StepKey {
    (step.kind().to_string(), step.container_name().map(str::to_string))
}

/// A scriptable step executor that:
/// - records every step it is given, in order
/// - posts the events a successful docker run would produce
/// - fails, errors, panics or blocks for steps it has been told to
#[derive(Clone, Default)]
pub struct FakeStepExecutor {
    executed: Arc<Mutex<Vec<TaskStep>>>,
    behaviours: Arc<Mutex<BTreeMap<StepKey, Behaviour>>>,
    exit_code: i64,
}

impl FakeStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit code reported when the task container exits.
    pub fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = exit_code;
        self
    }

    fn set(self, kind: &str, container: Option<&str>, behaviour: Behaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert((kind.to_string(), container.map(str::to_string)), behaviour);
        self
    }

    pub fn fail_step(self, kind: &str, container: Option<&str>) -> Self {
        self.set(kind, container, Behaviour::Fail)
    }

    pub fn error_on_step(self, kind: &str, container: Option<&str>, message: &str) -> Self {
        self.set(kind, container, Behaviour::Error(message.to_string()))
    }

    pub fn panic_on_step(self, kind: &str, container: Option<&str>) -> Self {
        self.set(kind, container, Behaviour::Panic)
    }

    pub fn block_step_until_cancelled(self, kind: &str, container: Option<&str>) -> Self {
        self.set(kind, container, Behaviour::BlockUntilCancelled)
    }

    pub fn delay_step(self, kind: &str, container: Option<&str>, delay: Duration) -> Self {
        self.set(kind, container, Behaviour::Delay(delay))
    }

    /// Every step run so far, in the order they started.
    pub fn steps(&self) -> Vec<TaskStep> {
        self.executed.lock().unwrap().clone()
    }

    /// `Display` form of every step run so far, e.g. `StartContainer(db)`.
    pub fn step_names(&self) -> Vec<String> {
        self.steps().iter().map(ToString::to_string).collect()
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.step_names().iter().position(|n| n == name)
    }

    async fn execute(&self, step: TaskStep, context: StepRunContext) -> Result<()> {
        self.executed.lock().unwrap().push(step.clone());

        let behaviour = self.behaviours.lock().unwrap().get(&key_for(&step)).cloned();
        match behaviour {
            Some(Behaviour::Fail) => {
                context.post(failure_for(&step));
                return Ok(());
            }
            Some(Behaviour::Error(message)) => {
                return Err(DockyardError::Other(anyhow::anyhow!(message)));
            }
            Some(Behaviour::Panic) => panic!("fake executor panicked on {step}"),
            Some(Behaviour::BlockUntilCancelled) => {
                context.cancellation.cancelled().await;
                return Err(Cancelled.into());
            }
            Some(Behaviour::Delay(delay)) => tokio::time::sleep(delay).await,
            None => {}
        }

        for event in self.success_events_for(&step) {
            context.post(event);
        }
        Ok(())
    }

    /// Events a successful docker run would post for `step`.
    pub fn success_events_for(&self, step: &TaskStep) -> Vec<TaskEvent> {
        match step {
            TaskStep::PrepareTaskNetwork => vec![TaskEvent::TaskNetworkCreated {
                network: DockerNetwork::new("test-network"),
            }],
            TaskStep::BuildImage { source, .. } => vec![TaskEvent::ImageBuilt {
                source: source.clone(),
                image: DockerImage::new(format!(
                    "built-{}",
                    source.build_directory.display()
                )),
            }],
            TaskStep::PullImage { image_name } => vec![TaskEvent::ImagePulled {
                image_name: image_name.clone(),
                image: DockerImage::new(format!("pulled-{image_name}")),
            }],
            TaskStep::CreateContainer { container, .. } => {
                let mut events = Vec::new();
                if let RunAsCurrentUser::CurrentUser { .. } = container.run_as_current_user {
                    events.push(TaskEvent::TemporaryFileCreated {
                        container: container.name.clone(),
                        path: PathBuf::from(format!("/tmp/{}-passwd", container.name)),
                    });
                    events.push(TaskEvent::TemporaryDirectoryCreated {
                        container: container.name.clone(),
                        path: PathBuf::from(format!("/tmp/{}-home", container.name)),
                    });
                }
                events.push(TaskEvent::ContainerCreated {
                    container: container.name.clone(),
                    docker_container: DockerContainer::new(
                        format!("{}-id", container.name),
                        format!("test-{}", container.name),
                    ),
                });
                events
            }
            TaskStep::StartContainer { container, .. } => vec![TaskEvent::ContainerStarted {
                container: container.clone(),
            }],
            TaskStep::RunContainer { container, .. } => vec![
                TaskEvent::ContainerStarted {
                    container: container.clone(),
                },
                TaskEvent::RunningContainerExited {
                    container: container.clone(),
                    exit_code: self.exit_code,
                },
            ],
            TaskStep::WaitForContainerToBecomeHealthy { container, .. } => {
                vec![TaskEvent::ContainerBecameHealthy {
                    container: container.clone(),
                }]
            }
            TaskStep::RunSetupCommands { container, .. } => {
                let mut events: Vec<TaskEvent> = container
                    .setup_commands
                    .iter()
                    .enumerate()
                    .map(|(index, command)| TaskEvent::RunningSetupCommand {
                        container: container.name.clone(),
                        command: command.clone(),
                        index,
                    })
                    .collect();
                events.push(TaskEvent::ContainerBecameReady {
                    container: container.name.clone(),
                });
                events
            }
            TaskStep::StopContainer { container, .. } => vec![TaskEvent::ContainerStopped {
                container: container.clone(),
            }],
            TaskStep::RemoveContainer { container, .. } => vec![TaskEvent::ContainerRemoved {
                container: container.clone(),
            }],
            TaskStep::DeleteTemporaryFile { path } => {
                vec![TaskEvent::TemporaryFileDeleted { path: path.clone() }]
            }
            TaskStep::DeleteTemporaryDirectory { path } => {
                vec![TaskEvent::TemporaryDirectoryDeleted { path: path.clone() }]
            }
            TaskStep::DeleteTaskNetwork { .. } => vec![TaskEvent::TaskNetworkDeleted],
        }
    }
}

/// The failure event a real executor would post for `step`.
pub fn failure_for(step: &TaskStep) -> TaskFailure {
    let message = "injected failure".to_string();
    match step {
        TaskStep::PrepareTaskNetwork => TaskFailure::TaskNetworkCreationFailed { message },
        TaskStep::BuildImage { source, .. } => TaskFailure::ImageBuildFailed {
            source: source.clone(),
            message,
        },
        TaskStep::PullImage { image_name } => TaskFailure::ImagePullFailed {
            image_name: image_name.clone(),
            message,
        },
        TaskStep::CreateContainer { container, .. } => TaskFailure::ContainerCreationFailed {
            container: container.name.clone(),
            message,
        },
        TaskStep::StartContainer { container, .. } => TaskFailure::ContainerStartFailed {
            container: container.clone(),
            message,
        },
        TaskStep::RunContainer { container, .. } => TaskFailure::ContainerRunFailed {
            container: container.clone(),
            message,
        },
        TaskStep::WaitForContainerToBecomeHealthy { container, .. } => {
            TaskFailure::ContainerDidNotBecomeHealthy {
                container: container.clone(),
                message,
            }
        }
        TaskStep::RunSetupCommands { container, .. } => match container.setup_commands.first() {
            Some(command) => TaskFailure::SetupCommandFailed {
                container: container.name.clone(),
                command: command.clone(),
                exit_code: 1,
                output: message,
            },
            None => TaskFailure::ExecutionFailed { message },
        },
        TaskStep::StopContainer { container, .. } => TaskFailure::ContainerStopFailed {
            container: container.clone(),
            message,
        },
        TaskStep::RemoveContainer { container, .. } => TaskFailure::ContainerRemovalFailed {
            container: container.clone(),
            message,
        },
        TaskStep::DeleteTemporaryFile { path } => TaskFailure::TemporaryFileDeletionFailed {
            path: path.clone(),
            message,
        },
        TaskStep::DeleteTemporaryDirectory { path } => {
            TaskFailure::TemporaryDirectoryDeletionFailed {
                path: path.clone(),
                message,
            }
        }
        TaskStep::DeleteTaskNetwork { .. } => TaskFailure::TaskNetworkDeletionFailed { message },
    }
}

impl StepExecutor for FakeStepExecutor {
    fn run<'a>(
        &'a self,
        step: TaskStep,
        context: StepRunContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.execute(step, context))
    }
}
