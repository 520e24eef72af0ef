// src/engine/task_runner.rs

//! Runs one task from graph construction through cleanup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::model::{ConfigFile, Task, TaskName};
use crate::dag::graph::ContainerDependencyGraph;
use crate::engine::cancellation::CancellationContext;
use crate::engine::interrupt::InterruptionTrap;
use crate::engine::manager::ParallelExecutionManager;
use crate::engine::state_machine::{PostTaskManualCleanup, TaskStateMachine};
use crate::errors::Result;
use crate::exec::backend::StepExecutor;
use crate::model::events::TaskEvent;
use crate::model::stages::{CleanupStagePlanner, RunStagePlanner};
use crate::types::RunOptions;
use crate::ui::EventLogger;

/// Outcome of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRunResult {
    pub task_name: TaskName,
    pub task_failed: bool,
    /// Exit code of the task container, if it ran to completion.
    pub exit_code: Option<i64>,
    pub manual_cleanup: PostTaskManualCleanup,
    pub events: Vec<TaskEvent>,
    pub duration: Duration,
}

impl TaskRunResult {
    fn prerequisites_only(task_name: &str) -> Self {
        Self {
            task_name: task_name.to_string(),
            task_failed: false,
            exit_code: None,
            manual_cleanup: PostTaskManualCleanup::NotRequired,
            events: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// `-1` if the task failed or left its containers running, otherwise
    /// the container's exit code (`0` for tasks that only have
    /// prerequisites).
    pub fn process_exit_code(&self) -> i32 {
        if self.task_failed {
            return -1;
        }

        if matches!(
            self.manual_cleanup,
            PostTaskManualCleanup::DueToTaskSuccessWithCleanupDisabled { .. }
        ) {
            return -1;
        }

        self.exit_code
            .map(|code| i32::try_from(code).unwrap_or(-1))
            .unwrap_or(0)
    }
}

pub struct TaskRunner {
    config: Arc<ConfigFile>,
    step_executor: Arc<dyn StepExecutor>,
    event_logger: Arc<dyn EventLogger>,
    trap_interrupts: bool,
}

impl TaskRunner {
    pub fn new(
        config: Arc<ConfigFile>,
        step_executor: Arc<dyn StepExecutor>,
        event_logger: Arc<dyn EventLogger>,
    ) -> Self {
        Self {
            config,
            step_executor,
            event_logger,
            trap_interrupts: false,
        }
    }

    /// Fail the running task on Ctrl-C.
    pub fn with_interrupt_trap(mut self, enabled: bool) -> Self {
        self.trap_interrupts = enabled;
        self
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub async fn run(&self, task: &Task, run_options: Arc<RunOptions>) -> Result<TaskRunResult> {
        if task.run_configuration.is_none() {
            info!(task = %task.name, "task has no run configuration, nothing to run");
            self.event_logger.on_task_only_has_prerequisites(&task.name);
            return Ok(TaskRunResult::prerequisites_only(&task.name));
        }

        let started = Instant::now();
        self.event_logger.on_task_starting(&task.name);

        let graph = Arc::new(ContainerDependencyGraph::new(&self.config, task, &run_options)?);
        let run_stage =
            RunStagePlanner::new(&self.config.project_name).create_stage(&graph, &run_options);

        let cancellation = CancellationContext::new();
        let state_machine = Arc::new(TaskStateMachine::new(
            Arc::clone(&graph),
            Arc::clone(&run_options),
            run_stage,
            CleanupStagePlanner::new(),
            cancellation.clone(),
        ));

        let manager = ParallelExecutionManager::new(
            Arc::clone(&self.event_logger),
            Arc::clone(&self.step_executor),
            Arc::clone(&state_machine),
            run_options,
            cancellation,
        );

        let trap = self
            .trap_interrupts
            .then(|| InterruptionTrap::install(manager.clone()));

        info!(task = %task.name, containers = graph.all_nodes().count(), "running task");
        let outcome = manager.run().await;
        drop(trap);
        outcome?;

        let result = TaskRunResult {
            task_name: task.name.clone(),
            task_failed: state_machine.task_has_failed(),
            exit_code: state_machine.task_exit_code().ok(),
            manual_cleanup: state_machine.post_task_manual_cleanup(),
            events: state_machine.all_events(),
            duration: started.elapsed(),
        };

        self.report(&result);
        Ok(result)
    }

    fn report(&self, result: &TaskRunResult) {
        if result.task_failed {
            warn!(task = %result.task_name, "task failed");
            self.event_logger
                .on_task_failed(&result.task_name, &result.manual_cleanup, &result.events);
            return;
        }

        let exit_code = result.exit_code.unwrap_or_default();
        info!(task = %result.task_name, exit_code, "task finished");
        self.event_logger
            .on_task_finished(&result.task_name, exit_code, result.duration);

        if result.manual_cleanup.is_required() {
            self.event_logger
                .on_task_finished_with_cleanup_disabled(&result.manual_cleanup, &result.events);
        }
    }
}
