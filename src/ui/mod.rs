// src/ui/mod.rs

//! Presentation of task progress.
//!
//! The scheduler forwards every event to an [`EventLogger`] and never waits
//! on it. [`ConsoleEventLogger`] writes short progress lines to STDERR.

pub mod messages;

use std::time::Duration;

use crate::engine::state_machine::PostTaskManualCleanup;
use crate::model::events::TaskEvent;
use crate::model::steps::TaskStep;

pub use messages::{describe_failure, manual_cleanup_instructions};

pub trait EventLogger: Send + Sync {
    fn post_event(&self, event: &TaskEvent);

    fn on_task_starting(&self, _task_name: &str) {}

    fn on_task_only_has_prerequisites(&self, _task_name: &str) {}

    fn on_task_finished(&self, _task_name: &str, _exit_code: i64, _duration: Duration) {}

    fn on_task_finished_with_cleanup_disabled(
        &self,
        _manual_cleanup: &PostTaskManualCleanup,
        _events: &[TaskEvent],
    ) {
    }

    fn on_task_failed(
        &self,
        _task_name: &str,
        _manual_cleanup: &PostTaskManualCleanup,
        _events: &[TaskEvent],
    ) {
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleEventLogger;

impl ConsoleEventLogger {
    pub fn new() -> Self {
        Self
    }

    fn describe_step(step: &TaskStep) -> Option<String> {
        let line = match step {
            TaskStep::BuildImage { source, .. } => {
                format!("Building image from '{}'...", source.build_directory.display())
            }
            TaskStep::PullImage { image_name } => format!("Pulling {image_name}..."),
            TaskStep::StartContainer { container, .. } => format!("Starting '{container}'..."),
            TaskStep::RunContainer { container, .. } => format!("Running '{container}'..."),
            TaskStep::WaitForContainerToBecomeHealthy { container, .. } => {
                format!("Waiting for '{container}' to become healthy...")
            }
            TaskStep::StopContainer { container, .. } => format!("Stopping '{container}'..."),
            TaskStep::DeleteTaskNetwork { .. } => "Removing task network...".to_string(),
            _ => return None,
        };
        Some(line)
    }
}

impl EventLogger for ConsoleEventLogger {
    fn post_event(&self, event: &TaskEvent) {
        let line = match event {
            TaskEvent::StepStarting { step } => Self::describe_step(step),
            TaskEvent::ImageBuilt { source, .. } => Some(format!(
                "Built image from '{}'.",
                source.build_directory.display()
            )),
            TaskEvent::ImagePulled { image_name, .. } => Some(format!("Pulled {image_name}.")),
            TaskEvent::RunningSetupCommand {
                container,
                command,
                index,
            } => Some(format!(
                "Running setup command {} '{command}' in '{container}'...",
                index + 1
            )),
            TaskEvent::ContainerBecameReady { container } => Some(format!("'{container}' is ready.")),
            TaskEvent::RunningContainerExited {
                container,
                exit_code,
            } => Some(format!("'{container}' exited with code {exit_code}.")),
            TaskEvent::Failed(failure) => Some(format!("Error: {}", describe_failure(failure))),
            _ => None,
        };

        if let Some(line) = line {
            eprintln!("{line}");
        }
    }

    fn on_task_starting(&self, task_name: &str) {
        eprintln!("Running task '{task_name}'...");
    }

    fn on_task_only_has_prerequisites(&self, task_name: &str) {
        eprintln!("The task '{task_name}' only defines prerequisite tasks, nothing more to do.");
    }

    fn on_task_finished(&self, task_name: &str, exit_code: i64, duration: Duration) {
        eprintln!(
            "Task '{task_name}' finished with exit code {exit_code} in {:.1}s.",
            duration.as_secs_f64()
        );
    }

    fn on_task_finished_with_cleanup_disabled(
        &self,
        manual_cleanup: &PostTaskManualCleanup,
        events: &[TaskEvent],
    ) {
        if let Some(text) = manual_cleanup_instructions(manual_cleanup, events) {
            eprintln!("\n{text}\n");
        }
    }

    fn on_task_failed(
        &self,
        task_name: &str,
        manual_cleanup: &PostTaskManualCleanup,
        events: &[TaskEvent],
    ) {
        eprintln!("\nThe task '{task_name}' failed. See above for details.");
        if let Some(text) = manual_cleanup_instructions(manual_cleanup, events) {
            eprintln!("\n{text}\n");
        }
    }
}
