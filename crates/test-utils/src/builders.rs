#![allow(dead_code)]

use dockyard::config::command::{Command, PortMapping};
use dockyard::config::model::{
    BuildImageSource, ConfigFile, Container, ImageSource, RunAsCurrentUser, Task,
    TaskContainerCustomisation, TaskRunConfiguration,
};

fn command(value: &str) -> Command {
    Command::parse(value).expect("Failed to parse command in builder")
}

/// Builder for `Container`. Pulls `<name>-image:latest` unless told otherwise.
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            container: Container::new(
                name,
                ImageSource::Pull {
                    image_name: format!("{name}-image:latest"),
                },
            ),
        }
    }

    pub fn image(mut self, image_name: &str) -> Self {
        self.container.image_source = ImageSource::Pull {
            image_name: image_name.to_string(),
        };
        self
    }

    pub fn build_directory(mut self, dir: &str) -> Self {
        self.container.image_source = ImageSource::Build(BuildImageSource::new(dir));
        self
    }

    pub fn command(mut self, value: &str) -> Self {
        self.container.command = Some(command(value));
        self
    }

    pub fn entrypoint(mut self, value: &str) -> Self {
        self.container.entrypoint = Some(command(value));
        self
    }

    pub fn working_directory(mut self, dir: &str) -> Self {
        self.container.working_directory = Some(dir.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.container
            .environment
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn port(mut self, local: u16, container: u16) -> Self {
        self.container
            .port_mappings
            .insert(PortMapping::new(local, container));
        self
    }

    pub fn depends_on(mut self, other: &str) -> Self {
        self.container.dependencies.insert(other.to_string());
        self
    }

    pub fn setup_command(mut self, value: &str) -> Self {
        self.container.setup_commands.push(command(value));
        self
    }

    pub fn run_as_current_user(mut self, home_directory: &str) -> Self {
        self.container.run_as_current_user = RunAsCurrentUser::CurrentUser {
            home_directory: home_directory.to_string(),
        };
        self
    }

    pub fn build(self) -> Container {
        self.container
    }
}

/// Builder for `Task`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    /// A task that runs in `container`.
    pub fn new(name: &str, container: &str) -> Self {
        Self {
            task: Task::new(name, Some(TaskRunConfiguration::new(container))),
        }
    }

    /// A task with no run configuration of its own.
    pub fn prerequisites_only(name: &str) -> Self {
        Self {
            task: Task::new(name, None),
        }
    }

    fn run(&mut self) -> &mut TaskRunConfiguration {
        self.task
            .run_configuration
            .as_mut()
            .expect("Task built with prerequisites_only has no run configuration")
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = description.to_string();
        self
    }

    pub fn command(mut self, value: &str) -> Self {
        self.run().command = Some(command(value));
        self
    }

    pub fn entrypoint(mut self, value: &str) -> Self {
        self.run().entrypoint = Some(command(value));
        self
    }

    pub fn working_directory(mut self, dir: &str) -> Self {
        self.run().working_directory = Some(dir.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.run()
            .additional_environment_variables
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn port(mut self, local: u16, container: u16) -> Self {
        self.run()
            .additional_port_mappings
            .insert(PortMapping::new(local, container));
        self
    }

    pub fn depends_on(mut self, container: &str) -> Self {
        self.task.dependencies.insert(container.to_string());
        self
    }

    pub fn prerequisite(mut self, task: &str) -> Self {
        self.task.prerequisites.push(task.to_string());
        self
    }

    pub fn customise(mut self, container: &str, customisation: TaskContainerCustomisation) -> Self {
        self.task
            .customisations
            .insert(container.to_string(), customisation);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    project_name: String,
    containers: Vec<Container>,
    tasks: Vec<Task>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            project_name: "test-project".to_string(),
            containers: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn project_name(mut self, name: &str) -> Self {
        self.project_name = name.to_string();
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    /// Shorthand for a container with only a name and dependencies.
    pub fn with_simple_container(self, name: &str, dependencies: &[&str]) -> Self {
        let builder = dependencies
            .iter()
            .fold(ContainerBuilder::new(name), |b, dep| b.depends_on(dep));
        self.with_container(builder.build())
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::new(self.project_name, self.containers, self.tasks)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
