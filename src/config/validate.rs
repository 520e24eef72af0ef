// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::config::command::{Command, PortMapping};
use crate::config::model::{
    BuildImageSource, ConfigFile, Container, ImageSource, RawConfigFile, RawContainer,
    RawCustomisation, RawTask, RawTaskRun, RunAsCurrentUser, Task, TaskContainerCustomisation,
    TaskRunConfiguration,
};
use crate::errors::{DockyardError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DockyardError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let project_name = validate_project_name(raw.project_name.as_deref())?;

        let containers = raw
            .containers
            .into_iter()
            .map(|(name, container)| convert_container(name, container))
            .collect::<Result<Vec<_>>>()?;

        let tasks = raw
            .tasks
            .into_iter()
            .map(|(name, task)| convert_task(name, task))
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigFile::new(project_name, containers, tasks))
    }
}

fn validate_project_name(name: Option<&str>) -> Result<String> {
    let name = name.ok_or_else(|| {
        DockyardError::ConfigError("project_name must be set".to_string())
    })?;

    // Docker image repository naming rules.
    let valid = Regex::new(r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*$")
        .map_err(anyhow::Error::from)?;

    if !valid.is_match(name) {
        return Err(DockyardError::ConfigError(format!(
            "Invalid project name '{name}'. The project name must be a valid Docker reference: it must contain only lowercase letters, digits, dashes (-), single consecutive periods (.) or one or two consecutive underscores (_), and must not start or end with dashes, periods or underscores."
        )));
    }

    Ok(name.to_string())
}

fn convert_container(name: String, raw: RawContainer) -> Result<Container> {
    let context = |field: &str| format!("container '{name}' field '{field}'");

    let image_source = match (raw.image, raw.build_directory) {
        (Some(image_name), None) => {
            if raw.dockerfile.is_some() || !raw.build_args.is_empty() {
                return Err(DockyardError::ConfigError(format!(
                    "Container '{name}' sets 'dockerfile' or 'build_args' but pulls an image instead of building one."
                )));
            }
            ImageSource::Pull { image_name }
        }
        (None, Some(build_directory)) => ImageSource::Build(BuildImageSource {
            build_directory,
            dockerfile: raw.dockerfile.unwrap_or_else(|| "Dockerfile".to_string()),
            build_args: raw.build_args,
        }),
        (Some(_), Some(_)) => {
            return Err(DockyardError::ConfigError(format!(
                "Container '{name}' must have exactly one of 'image' or 'build_directory', not both."
            )));
        }
        (None, None) => {
            return Err(DockyardError::ConfigError(format!(
                "Container '{name}' must have exactly one of 'image' or 'build_directory'."
            )));
        }
    };

    let run_as_current_user = match (raw.run_as_current_user.enabled, raw.run_as_current_user.home_directory) {
        (true, Some(home_directory)) => RunAsCurrentUser::CurrentUser { home_directory },
        (true, None) => {
            return Err(DockyardError::ConfigError(format!(
                "Container '{name}' enables run_as_current_user but does not set 'home_directory'."
            )));
        }
        (false, Some(_)) => {
            return Err(DockyardError::ConfigError(format!(
                "Container '{name}' sets run_as_current_user 'home_directory' but does not enable it."
            )));
        }
        (false, None) => RunAsCurrentUser::DefaultContainerUser,
    };

    let dependencies = raw.dependencies.into_iter().collect::<BTreeSet<_>>();

    Ok(Container {
        command: parse_optional_command(raw.command, &context("command"))?,
        entrypoint: parse_optional_command(raw.entrypoint, &context("entrypoint"))?,
        working_directory: raw.working_directory,
        environment: raw.environment,
        port_mappings: parse_ports(&raw.ports, &context("ports"))?,
        dependencies,
        setup_commands: raw
            .setup_commands
            .iter()
            .map(|c| parse_command(c, &context("setup_commands")))
            .collect::<Result<Vec<_>>>()?,
        run_as_current_user,
        image_source,
        name,
    })
}

fn convert_task(name: String, raw: RawTask) -> Result<Task> {
    let run_configuration = raw
        .run
        .map(|run| convert_run_configuration(&name, run))
        .transpose()?;

    let customisations = raw
        .customise
        .into_iter()
        .map(|(container, customisation)| {
            let converted = convert_customisation(&name, &container, customisation)?;
            Ok((container, converted))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(Task {
        description: raw.description.unwrap_or_default(),
        run_configuration,
        dependencies: raw.dependencies.into_iter().collect(),
        customisations,
        prerequisites: raw.prerequisites,
        name,
    })
}

fn convert_run_configuration(task: &str, raw: RawTaskRun) -> Result<TaskRunConfiguration> {
    if raw.container.trim().is_empty() {
        return Err(DockyardError::ConfigError(format!(
            "Task '{task}' has a run configuration without a container."
        )));
    }

    let context = |field: &str| format!("task '{task}' field 'run.{field}'");

    Ok(TaskRunConfiguration {
        command: parse_optional_command(raw.command, &context("command"))?,
        entrypoint: parse_optional_command(raw.entrypoint, &context("entrypoint"))?,
        working_directory: raw.working_directory,
        additional_environment_variables: raw.environment,
        additional_port_mappings: parse_ports(&raw.ports, &context("ports"))?,
        container: raw.container,
    })
}

fn convert_customisation(
    task: &str,
    container: &str,
    raw: RawCustomisation,
) -> Result<TaskContainerCustomisation> {
    Ok(TaskContainerCustomisation {
        working_directory: raw.working_directory,
        additional_environment_variables: raw.environment,
        additional_port_mappings: parse_ports(
            &raw.ports,
            &format!("task '{task}' customisation for '{container}' field 'ports'"),
        )?,
    })
}

fn parse_optional_command(raw: Option<String>, context: &str) -> Result<Option<Command>> {
    raw.map(|c| parse_command(&c, context)).transpose()
}

fn parse_command(raw: &str, context: &str) -> Result<Command> {
    Command::parse(raw).map_err(|e| DockyardError::ConfigError(format!("{context}: {e}")))
}

fn parse_ports(raw: &[String], context: &str) -> Result<BTreeSet<PortMapping>> {
    raw.iter()
        .map(|p| {
            p.parse::<PortMapping>()
                .map_err(|e| DockyardError::ConfigError(format!("{context}: {e}")))
        })
        .collect()
}
