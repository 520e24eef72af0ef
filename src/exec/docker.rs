// src/exec/docker.rs

//! Production step executor that drives the `docker` command line client.
//!
//! Each step turns into one or more `docker` invocations. Whatever the
//! outcome, it is reported as exactly one terminal event; only
//! cancellation escapes as an error. Cleanup steps and the task container's
//! run ignore cancellation: cleanup must run after a failure has already
//! fired it, and the task container is only finished once it exits.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::io::IsTerminal;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::command::Command;
use crate::config::model::{BuildImageSource, Container, ContainerName, RunAsCurrentUser};
use crate::dag::overrides::ContainerRuntimeConfiguration;
use crate::errors::Result;
use crate::exec::backend::{StepExecutor, StepRunContext};
use crate::exec::current_user::{CreatedPath, UserAndGroup, create_current_user_files};
use crate::exec::process::{DockerCli, ProcessOutput};
use crate::exec::proxy::proxy_environment_variables;
use crate::fs::FileSystem;
use crate::model::events::{TaskEvent, TaskFailure};
use crate::model::resources::{DockerContainer, DockerImage, DockerNetwork};
use crate::model::steps::TaskStep;

const DEFAULT_HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of a docker invocation: the output if it succeeded, otherwise a
/// message fit for a failure event. Cancellation is the only `Err`.
type Outcome = Result<std::result::Result<ProcessOutput, String>>;

fn classify(result: Result<ProcessOutput>) -> Outcome {
    match result {
        Ok(output) if output.succeeded() => Ok(Ok(output)),
        Ok(output) => Ok(Err(output.error_message())),
        Err(err) if err.is_cancellation() => Err(err),
        Err(err) => Ok(Err(err.to_string())),
    }
}

/// Reads a variable from the host environment.
type EnvironmentLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

pub struct DockerCliStepExecutor {
    docker: DockerCli,
    project_name: String,
    fs: Arc<dyn FileSystem>,
    run_id: String,
    health_poll_interval: Duration,
    current_user: OnceCell<UserAndGroup>,
    environment: EnvironmentLookup,
}

impl DockerCliStepExecutor {
    pub fn new(project_name: impl Into<String>, fs: Arc<dyn FileSystem>) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        Self {
            docker: DockerCli::default(),
            project_name: project_name.into(),
            fs,
            run_id: run_id[..12].to_string(),
            health_poll_interval: DEFAULT_HEALTH_POLL_INTERVAL,
            current_user: OnceCell::new(),
            environment: Arc::new(|name: &str| std::env::var(name).ok()),
        }
    }

    pub fn with_docker(mut self, docker: DockerCli) -> Self {
        self.docker = docker;
        self
    }

    pub fn with_health_poll_interval(mut self, interval: Duration) -> Self {
        self.health_poll_interval = interval;
        self
    }

    /// Use `user` for run-as-current-user containers instead of asking `id`.
    pub fn with_current_user(mut self, user: UserAndGroup) -> Self {
        self.current_user = OnceCell::new_with(Some(user));
        self
    }

    /// Where host proxy variables are read from.
    pub fn with_environment(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.environment = Arc::new(lookup);
        self
    }

    /// Identifier shared by every docker resource this executor creates.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn proxy_variables(
        &self,
        context: &StepRunContext,
        extra_no_proxy: &BTreeSet<ContainerName>,
    ) -> BTreeMap<String, String> {
        if !context.run_options.propagate_proxy_environment_variables {
            return BTreeMap::new();
        }
        proxy_environment_variables(|name| (self.environment)(name), extra_no_proxy)
    }

    fn network_name(&self) -> String {
        format!("{}-{}", self.project_name, self.run_id)
    }

    fn container_name(&self, container: &str) -> String {
        format!("{}-{}-{}", self.project_name, container, self.run_id)
    }

    async fn execute(&self, step: TaskStep, context: &StepRunContext) -> Result<()> {
        match step {
            TaskStep::PrepareTaskNetwork => self.create_network(context).await,
            TaskStep::BuildImage { source, image_tags } => {
                self.build_image(&source, image_tags.into_iter().collect(), context)
                    .await
            }
            TaskStep::PullImage { image_name } => self.pull_image(&image_name, context).await,
            TaskStep::CreateContainer {
                container,
                config,
                is_task_container,
                image,
                network,
                all_containers_in_network,
            } => {
                let proxy = self.proxy_variables(context, &all_containers_in_network);
                self.create_container(
                    &container,
                    &config,
                    is_task_container,
                    &image,
                    &network,
                    proxy,
                    context,
                )
                .await
            }
            TaskStep::StartContainer {
                container,
                docker_container,
            } => self.start_container(container, &docker_container, context).await,
            TaskStep::RunContainer {
                container,
                docker_container,
            } => self.run_container(container, &docker_container, context).await,
            TaskStep::WaitForContainerToBecomeHealthy {
                container,
                docker_container,
            } => self.wait_for_health(container, &docker_container, context).await,
            TaskStep::RunSetupCommands {
                container,
                config,
                docker_container,
            } => {
                self.run_setup_commands(&container, &config, &docker_container, context)
                    .await
            }
            TaskStep::StopContainer {
                container,
                docker_container,
            } => self.stop_container(container, &docker_container, context).await,
            TaskStep::RemoveContainer {
                container,
                docker_container,
            } => self.remove_container(container, &docker_container, context).await,
            TaskStep::DeleteTemporaryFile { path } => {
                self.delete_temporary_file(&path, context);
                Ok(())
            }
            TaskStep::DeleteTemporaryDirectory { path } => {
                self.delete_temporary_directory(&path, context);
                Ok(())
            }
            TaskStep::DeleteTaskNetwork { network } => self.delete_network(&network, context).await,
        }
    }

    async fn create_network(&self, context: &StepRunContext) -> Result<()> {
        let command = args(["network", "create", "--driver", "bridge"])
            .into_iter()
            .chain([self.network_name()])
            .collect::<Vec<_>>();

        let outcome = classify(
            self.docker
                .output_cancellable(&command, &context.cancellation)
                .await,
        )?;

        match outcome {
            Ok(output) => {
                let network = DockerNetwork::new(output.stdout.trim());
                info!(%network, "created task network");
                context.post(TaskEvent::TaskNetworkCreated { network });
            }
            Err(message) => context.post(TaskFailure::TaskNetworkCreationFailed { message }),
        }
        Ok(())
    }

    async fn build_image(
        &self,
        source: &BuildImageSource,
        image_tags: Vec<String>,
        context: &StepRunContext,
    ) -> Result<()> {
        let Some(primary_tag) = image_tags.first().cloned() else {
            context.post(TaskFailure::ImageBuildFailed {
                source: source.clone(),
                message: "No image tag was provided for the build.".to_string(),
            });
            return Ok(());
        };

        let mut command = args(["build", "--file"]);
        command.push(
            source
                .build_directory
                .join(&source.dockerfile)
                .display()
                .to_string(),
        );
        for tag in &image_tags {
            command.extend(["--tag".to_string(), tag.clone()]);
        }
        for (name, value) in self.proxy_variables(context, &BTreeSet::new()) {
            command.extend(["--build-arg".to_string(), format!("{name}={value}")]);
        }
        for (name, value) in &source.build_args {
            command.extend(["--build-arg".to_string(), format!("{name}={value}")]);
        }
        command.push(source.build_directory.display().to_string());

        let outcome = classify(
            self.docker
                .stream_cancellable(&command, &context.cancellation, |line| {
                    context.post(TaskEvent::ImageBuildProgress {
                        source: source.clone(),
                        message: line.to_string(),
                    })
                })
                .await,
        )?;

        if let Err(message) = outcome {
            context.post(TaskFailure::ImageBuildFailed {
                source: source.clone(),
                message,
            });
            return Ok(());
        }

        match self.image_id(&primary_tag, context).await? {
            Ok(image) => context.post(TaskEvent::ImageBuilt {
                source: source.clone(),
                image,
            }),
            Err(message) => context.post(TaskFailure::ImageBuildFailed {
                source: source.clone(),
                message,
            }),
        }
        Ok(())
    }

    async fn image_id(
        &self,
        reference: &str,
        context: &StepRunContext,
    ) -> Result<std::result::Result<DockerImage, String>> {
        let command = args(["image", "inspect", "--format", "{{.Id}}", reference]);
        let outcome = classify(
            self.docker
                .output_cancellable(&command, &context.cancellation)
                .await,
        )?;
        Ok(outcome.map(|output| DockerImage::new(output.stdout.trim())))
    }

    async fn pull_image(&self, image_name: &str, context: &StepRunContext) -> Result<()> {
        if let Ok(image) = self.image_id(image_name, context).await? {
            debug!(%image_name, "image already present, not pulling");
            context.post(TaskEvent::ImagePulled {
                image_name: image_name.to_string(),
                image,
            });
            return Ok(());
        }

        let command = args(["pull", image_name]);
        let outcome = classify(
            self.docker
                .stream_cancellable(&command, &context.cancellation, |line| {
                    context.post(TaskEvent::ImagePullProgress {
                        image_name: image_name.to_string(),
                        message: line.to_string(),
                    })
                })
                .await,
        )?;

        let result = match outcome {
            Ok(_) => self.image_id(image_name, context).await?,
            Err(message) => Err(message),
        };

        match result {
            Ok(image) => context.post(TaskEvent::ImagePulled {
                image_name: image_name.to_string(),
                image,
            }),
            Err(message) => context.post(TaskFailure::ImagePullFailed {
                image_name: image_name.to_string(),
                message,
            }),
        }
        Ok(())
    }

    async fn current_user(&self) -> anyhow::Result<&UserAndGroup> {
        self.current_user.get_or_try_init(UserAndGroup::current).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_container(
        &self,
        container: &Container,
        config: &ContainerRuntimeConfiguration,
        is_task_container: bool,
        image: &DockerImage,
        network: &DockerNetwork,
        proxy_environment: BTreeMap<String, String>,
        context: &StepRunContext,
    ) -> Result<()> {
        let name = self.container_name(&container.name);
        let fail = |message: String| {
            context.post(TaskFailure::ContainerCreationFailed {
                container: container.name.clone(),
                message,
            })
        };

        let mut command = args(["create", "--name"]);
        command.push(name.clone());
        command.extend(["--network".to_string(), network.id.clone()]);
        command.extend(["--network-alias".to_string(), container.name.clone()]);
        command.extend(["--hostname".to_string(), container.name.clone()]);

        if let Some(dir) = &config.working_directory {
            command.extend(["--workdir".to_string(), dir.clone()]);
        }

        let mut environment = container.environment.clone();
        environment.extend(config.additional_environment_variables.clone());
        environment.extend(proxy_environment);
        for (key, value) in &environment {
            command.extend(["--env".to_string(), format!("{key}={value}")]);
        }

        for mapping in container
            .port_mappings
            .iter()
            .chain(&config.additional_port_mappings)
        {
            command.extend(["--publish".to_string(), mapping.to_string()]);
        }

        if let RunAsCurrentUser::CurrentUser { home_directory } = &container.run_as_current_user {
            let user = match self.current_user().await {
                Ok(user) => user,
                Err(err) => {
                    fail(format!("Could not determine the current user: {err:#}"));
                    return Ok(());
                }
            };

            let created = create_current_user_files(
                self.fs.as_ref(),
                &name,
                user,
                home_directory,
                |path| match path {
                    CreatedPath::File(path) => context.post(TaskEvent::TemporaryFileCreated {
                        container: container.name.clone(),
                        path,
                    }),
                    CreatedPath::Directory(path) => {
                        context.post(TaskEvent::TemporaryDirectoryCreated {
                            container: container.name.clone(),
                            path,
                        })
                    }
                },
            );

            match created {
                Ok(files) => {
                    command.extend(files.volume_arguments(home_directory));
                    command.extend(["--user".to_string(), user.docker_user()]);
                }
                Err(err) => {
                    fail(format!("Could not create files for the current user: {err:#}"));
                    return Ok(());
                }
            }
        }

        if is_task_container {
            command.push("--interactive".to_string());
            if std::io::stdin().is_terminal() {
                command.push("--tty".to_string());
            }
        }

        let entrypoint = config.entrypoint.as_ref().map(Command::parsed);
        if let Some([executable, ..]) = entrypoint {
            command.extend(["--entrypoint".to_string(), executable.clone()]);
        }

        command.push(image.id.clone());

        if let Some([_, rest @ ..]) = entrypoint {
            command.extend(rest.iter().cloned());
        }
        if let Some(cmd) = &config.command {
            command.extend(cmd.parsed().iter().cloned());
        }

        let outcome = classify(
            self.docker
                .output_cancellable(&command, &context.cancellation)
                .await,
        )?;

        match outcome {
            Ok(output) => context.post(TaskEvent::ContainerCreated {
                container: container.name.clone(),
                docker_container: DockerContainer::new(output.stdout.trim(), name),
            }),
            Err(message) => fail(message),
        }
        Ok(())
    }

    async fn start_container(
        &self,
        container: ContainerName,
        docker_container: &DockerContainer,
        context: &StepRunContext,
    ) -> Result<()> {
        let command = args(["start", docker_container.id.as_str()]);
        let outcome = classify(
            self.docker
                .output_cancellable(&command, &context.cancellation)
                .await,
        )?;

        match outcome {
            Ok(_) => context.post(TaskEvent::ContainerStarted { container }),
            Err(message) => context.post(TaskFailure::ContainerStartFailed { container, message }),
        }
        Ok(())
    }

    async fn run_container(
        &self,
        container: ContainerName,
        docker_container: &DockerContainer,
        context: &StepRunContext,
    ) -> Result<()> {
        let command = args([
            "start",
            "--attach",
            "--interactive",
            docker_container.id.as_str(),
        ]);

        // Cancellation is ignored here: the container only stops once it
        // exits, and cleanup must know it was started.
        if let Err(err) = self.docker.run_attached(&command).await {
            context.post(TaskFailure::ContainerRunFailed {
                container,
                message: err.to_string(),
            });
            return Ok(());
        }

        // The client's exit code can't tell a container that never started
        // apart from one that exited non-zero, so ask docker.
        let inspect = args([
            "inspect",
            "--format",
            "{{.State.StartedAt}} {{.State.ExitCode}} {{.State.Error}}",
            docker_container.id.as_str(),
        ]);
        let outcome = classify(self.docker.output(&inspect).await)?;

        let output = match outcome {
            Ok(output) => output.stdout,
            Err(message) => {
                context.post(TaskFailure::ContainerRunFailed { container, message });
                return Ok(());
            }
        };

        let mut fields = output.trim().splitn(3, ' ');
        let started_at = fields.next().unwrap_or_default();
        let exit_code = fields.next().and_then(|code| code.parse::<i64>().ok());
        let error = fields.next().unwrap_or_default().trim();

        if started_at.starts_with("0001-01-01") {
            let message = if error.is_empty() {
                "The container did not start.".to_string()
            } else {
                error.to_string()
            };
            context.post(TaskFailure::ContainerRunFailed { container, message });
            return Ok(());
        }

        let Some(exit_code) = exit_code else {
            context.post(TaskFailure::ContainerRunFailed {
                container,
                message: format!("Could not read the exit code of the container from '{}'.", output.trim()),
            });
            return Ok(());
        };

        context.post(TaskEvent::ContainerStarted {
            container: container.clone(),
        });
        context.post(TaskEvent::RunningContainerExited {
            container,
            exit_code,
        });
        Ok(())
    }

    async fn wait_for_health(
        &self,
        container: ContainerName,
        docker_container: &DockerContainer,
        context: &StepRunContext,
    ) -> Result<()> {
        let command = args([
            "inspect",
            "--format",
            "{{if .State.Health}}{{.State.Health.Status}}{{else}}none{{end}} {{.State.Status}}",
            docker_container.id.as_str(),
        ]);

        let poll = async {
            loop {
                let output = match classify(self.docker.output(&command).await)? {
                    Ok(output) => output.stdout,
                    Err(message) => return Ok::<_, crate::errors::DockyardError>(Err(message)),
                };

                let mut fields = output.split_whitespace();
                let health = fields.next().unwrap_or_default();
                let state = fields.next().unwrap_or_default();

                match (health, state) {
                    ("none", _) | ("healthy", _) => return Ok(Ok(())),
                    ("unhealthy", _) => {
                        return Ok(Err(
                            "The configured health check did not indicate that the container was healthy."
                                .to_string(),
                        ));
                    }
                    (_, "exited") | (_, "dead") => {
                        return Ok(Err("The container exited before becoming healthy.".to_string()));
                    }
                    _ => tokio::time::sleep(self.health_poll_interval).await,
                }
            }
        };

        match context.cancellation.run_cancellable(poll).await?? {
            Ok(()) => context.post(TaskEvent::ContainerBecameHealthy { container }),
            Err(message) => {
                context.post(TaskFailure::ContainerDidNotBecomeHealthy { container, message })
            }
        }
        Ok(())
    }

    async fn run_setup_commands(
        &self,
        container: &Container,
        config: &ContainerRuntimeConfiguration,
        docker_container: &DockerContainer,
        context: &StepRunContext,
    ) -> Result<()> {
        let mut environment = container.environment.clone();
        environment.extend(config.additional_environment_variables.clone());

        for (index, setup_command) in container.setup_commands.iter().enumerate() {
            context.post(TaskEvent::RunningSetupCommand {
                container: container.name.clone(),
                command: setup_command.clone(),
                index,
            });

            let mut command = args(["exec"]);
            if let Some(dir) = &config.working_directory {
                command.extend(["--workdir".to_string(), dir.clone()]);
            }
            for (key, value) in &environment {
                command.extend(["--env".to_string(), format!("{key}={value}")]);
            }
            command.push(docker_container.id.clone());
            command.extend(setup_command.parsed().iter().cloned());

            let result = self
                .docker
                .stream_cancellable(&command, &context.cancellation, |_| {})
                .await;

            match result {
                Ok(output) if output.succeeded() => {}
                Ok(output) => {
                    context.post(TaskFailure::SetupCommandFailed {
                        container: container.name.clone(),
                        command: setup_command.clone(),
                        exit_code: output.exit_code,
                        output: output.combined_output(),
                    });
                    return Ok(());
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    context.post(TaskFailure::SetupCommandExecutionError {
                        container: container.name.clone(),
                        command: setup_command.clone(),
                        message: err.to_string(),
                    });
                    return Ok(());
                }
            }
        }

        context.post(TaskEvent::ContainerBecameReady {
            container: container.name.clone(),
        });
        Ok(())
    }

    async fn stop_container(
        &self,
        container: ContainerName,
        docker_container: &DockerContainer,
        context: &StepRunContext,
    ) -> Result<()> {
        let command = args(["stop", docker_container.id.as_str()]);
        match classify(self.docker.output(&command).await)? {
            Ok(_) => context.post(TaskEvent::ContainerStopped { container }),
            Err(message) => context.post(TaskFailure::ContainerStopFailed { container, message }),
        }
        Ok(())
    }

    async fn remove_container(
        &self,
        container: ContainerName,
        docker_container: &DockerContainer,
        context: &StepRunContext,
    ) -> Result<()> {
        let command = args(["rm", "--force", "--volumes", docker_container.id.as_str()]);
        match classify(self.docker.output(&command).await)? {
            Ok(_) => context.post(TaskEvent::ContainerRemoved { container }),
            Err(message) => {
                context.post(TaskFailure::ContainerRemovalFailed { container, message })
            }
        }
        Ok(())
    }

    fn delete_temporary_file(&self, path: &Path, context: &StepRunContext) {
        match self.fs.remove_file(path) {
            Ok(()) => context.post(TaskEvent::TemporaryFileDeleted {
                path: path.to_path_buf(),
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not delete temporary file");
                context.post(TaskFailure::TemporaryFileDeletionFailed {
                    path: path.to_path_buf(),
                    message: format!("{err:#}"),
                })
            }
        }
    }

    fn delete_temporary_directory(&self, path: &Path, context: &StepRunContext) {
        match self.fs.remove_dir_all(path) {
            Ok(()) => context.post(TaskEvent::TemporaryDirectoryDeleted {
                path: path.to_path_buf(),
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not delete temporary directory");
                context.post(TaskFailure::TemporaryDirectoryDeletionFailed {
                    path: path.to_path_buf(),
                    message: format!("{err:#}"),
                })
            }
        }
    }

    async fn delete_network(&self, network: &DockerNetwork, context: &StepRunContext) -> Result<()> {
        let command = args(["network", "rm", network.id.as_str()]);
        match classify(self.docker.output(&command).await)? {
            Ok(_) => context.post(TaskEvent::TaskNetworkDeleted),
            Err(message) => context.post(TaskFailure::TaskNetworkDeletionFailed { message }),
        }
        Ok(())
    }
}

impl StepExecutor for DockerCliStepExecutor {
    fn run<'a>(
        &'a self,
        step: TaskStep,
        context: StepRunContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            debug!(%step, "executing step");
            self.execute(step, &context).await
        })
    }
}
