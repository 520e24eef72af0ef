// src/dag/overrides.rs

//! Effective runtime settings for one container within one task.
//!
//! The task's own container takes its overrides from the task's run
//! configuration. Every other container takes them from the task's
//! customisation for that container, if any.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::command::{Command, PortMapping};
use crate::config::model::{Container, Task, TaskContainerCustomisation};
use crate::errors::GraphError;
use crate::types::RunOptions;

/// Settings resolved for a node of the container dependency graph.
///
/// Fields are `None`/empty unless something overrides or supplies them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ContainerRuntimeConfiguration {
    pub command: Option<Command>,
    pub entrypoint: Option<Command>,
    pub working_directory: Option<String>,
    pub additional_environment_variables: BTreeMap<String, String>,
    pub additional_port_mappings: BTreeSet<PortMapping>,
}

impl ContainerRuntimeConfiguration {
    /// Resolve every setting for `container` as used by `task`.
    pub fn resolve(
        container: &Container,
        task: &Task,
        is_root_node: bool,
        run_options: &RunOptions,
    ) -> Result<Self, GraphError> {
        let command = resolve_command(container, task, is_root_node, run_options)?;
        let entrypoint = resolve_entrypoint(container, task, is_root_node);

        if is_root_node {
            let run = task.run_configuration.as_ref();
            return Ok(Self {
                command,
                entrypoint,
                working_directory: run
                    .and_then(|r| r.working_directory.clone())
                    .or_else(|| container.working_directory.clone()),
                additional_environment_variables: run
                    .map(|r| r.additional_environment_variables.clone())
                    .unwrap_or_default(),
                additional_port_mappings: run
                    .map(|r| r.additional_port_mappings.clone())
                    .unwrap_or_default(),
            });
        }

        let customisation = task.customisations.get(&container.name);
        Ok(Self {
            command,
            entrypoint,
            working_directory: resolve_customised_working_directory(container, customisation),
            additional_environment_variables: customisation
                .map(|c| c.additional_environment_variables.clone())
                .unwrap_or_default(),
            additional_port_mappings: customisation
                .map(|c| c.additional_port_mappings.clone())
                .unwrap_or_default(),
        })
    }
}

/// Command for `container`, with the user's extra arguments appended when
/// this is the main task's own container.
pub fn resolve_command(
    container: &Container,
    task: &Task,
    is_root_node: bool,
    run_options: &RunOptions,
) -> Result<Option<Command>, GraphError> {
    if !is_root_node {
        return Ok(container.command.clone());
    }

    let base = task
        .run_configuration
        .as_ref()
        .and_then(|r| r.command.as_ref())
        .or(container.command.as_ref());

    let args = &run_options.additional_task_command_arguments;
    if args.is_empty() || !run_options.is_main_task(&task.name) {
        return Ok(base.cloned());
    }

    match base {
        Some(command) => Ok(Some(command.with_additional_arguments(args))),
        None => Err(GraphError::AdditionalArgumentsWithoutCommand {
            task: task.name.clone(),
            container: container.name.clone(),
        }),
    }
}

/// Entrypoint for `container`. Never receives extra arguments.
pub fn resolve_entrypoint(container: &Container, task: &Task, is_root_node: bool) -> Option<Command> {
    let task_override = if is_root_node {
        task.run_configuration
            .as_ref()
            .and_then(|r| r.entrypoint.clone())
    } else {
        None
    };

    task_override.or_else(|| container.entrypoint.clone())
}

fn resolve_customised_working_directory(
    container: &Container,
    customisation: Option<&TaskContainerCustomisation>,
) -> Option<String> {
    customisation
        .and_then(|c| c.working_directory.clone())
        .or_else(|| container.working_directory.clone())
}
