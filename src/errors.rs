// src/errors.rs

//! Crate-wide error types.
//!
//! Graph and task-order errors are raised before anything starts and carry
//! the message shown to the user. Runtime step failures are never errors;
//! they travel as failure events through the state machine instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockyardError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    TaskOrder(#[from] TaskOrderError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerInvariantViolation),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DockyardError {
    /// True if this error is (or wraps) a cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            DockyardError::Cancelled(_) => true,
            DockyardError::Other(err) => err.chain().any(|cause| cause.is::<Cancelled>()),
            _ => false,
        }
    }
}

/// Problems found while building the container dependency graph for a task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Cannot create a container dependency graph for the task '{task}' because it only has prerequisites.")]
    TaskHasNoRunConfiguration { task: String },

    #[error("The task '{task}' cannot have the container '{container}' as both the main task container and also a dependency.")]
    MainContainerIsAlsoDependency { task: String, container: String },

    #[error("The container '{container}' referenced by {referenced_by} does not exist.")]
    ContainerDoesNotExist {
        container: String,
        referenced_by: String,
    },

    #[error("The container '{container}' cannot depend on itself.")]
    SelfDependency { container: String },

    #[error("There is a dependency cycle in task '{task}'. {description}")]
    DependencyCycle {
        task: String,
        description: String,
        /// Containers along the detected path, ending with the repeated one.
        path: Vec<String>,
    },

    #[error("The task '{task}' has customisations for container '{container}', but the container '{container}' will not be started as part of the task.")]
    CustomisationForUnusedContainer { task: String, container: String },

    #[error("Additional command line arguments for the task have been provided, but neither the task ({task}) nor the main task container ({container}) have an explicit command in the configuration file.")]
    AdditionalArgumentsWithoutCommand { task: String, container: String },
}

/// Problems found while expanding a task into its prerequisites.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskOrderError {
    #[error("The task '{task}' does not exist.{suggestions} (Run 'dockyard --list-tasks' for a list of all tasks in this project, or 'dockyard --help' for help.)")]
    TaskDoesNotExist { task: String, suggestions: String },

    #[error("The task '{prerequisite}' given as a prerequisite of '{task}' does not exist.{suggestions}")]
    PrerequisiteDoesNotExist {
        prerequisite: String,
        task: String,
        suggestions: String,
    },

    #[error("There is a dependency cycle between tasks: {description}.")]
    DependencyCycle { description: String, path: Vec<String> },
}

/// The scheduler reached a state that should be unreachable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerInvariantViolation {
    #[error("None of the remaining steps are ready to execute, but there are no steps currently running.")]
    NoStepsReadyAndNoneRunning,

    #[error("The task has not yet finished or has failed.")]
    TaskNotFinished,
}

/// Work was abandoned because the task's cancellation context fired.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DockyardError>;
