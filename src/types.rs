// src/types.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::config::model::{ContainerName, TaskName};

/// What to do with created resources once the run stage is over.
///
/// - `Cleanup`: stop and remove everything the task created (default).
/// - `DontCleanup`: leave containers running for inspection and print the
///   commands needed to remove them by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupOption {
    #[default]
    Cleanup,
    DontCleanup,
}

/// Per-invocation options, read-only for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// The task the user asked for; prerequisites run under the same options.
    pub task_name: TaskName,
    pub additional_task_command_arguments: Vec<String>,
    pub behaviour_after_success: CleanupOption,
    pub behaviour_after_failure: CleanupOption,
    pub propagate_proxy_environment_variables: bool,
    /// Extra tags applied to images built for a container.
    pub image_tags: BTreeMap<ContainerName, BTreeSet<String>>,
    /// Containers whose image source is replaced by pulling this image.
    pub image_overrides: BTreeMap<ContainerName, String>,
}

impl RunOptions {
    pub fn new(task_name: impl Into<TaskName>) -> Self {
        Self {
            task_name: task_name.into(),
            propagate_proxy_environment_variables: true,
            ..Self::default()
        }
    }

    pub fn is_main_task(&self, task_name: &str) -> bool {
        self.task_name == task_name
    }
}
