// src/engine/session.rs

use std::sync::Arc;

use tracing::info;

use crate::config::model::ConfigFile;
use crate::dag::task_order::TaskExecutionOrderResolver;
use crate::engine::task_runner::{TaskRunResult, TaskRunner};
use crate::errors::Result;
use crate::exec::backend::StepExecutor;
use crate::types::RunOptions;
use crate::ui::EventLogger;

/// What a whole invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub exit_code: i32,
    /// One entry per task that was started, in order.
    pub results: Vec<TaskRunResult>,
}

/// Runs the requested task after its prerequisites, one task at a time.
pub struct SessionRunner {
    config: Arc<ConfigFile>,
    task_runner: TaskRunner,
}

impl SessionRunner {
    pub fn new(
        config: Arc<ConfigFile>,
        step_executor: Arc<dyn StepExecutor>,
        event_logger: Arc<dyn EventLogger>,
    ) -> Self {
        let task_runner = TaskRunner::new(Arc::clone(&config), step_executor, event_logger);
        Self {
            config,
            task_runner,
        }
    }

    pub fn with_interrupt_trap(mut self, enabled: bool) -> Self {
        self.task_runner = self.task_runner.with_interrupt_trap(enabled);
        self
    }

    /// Stops at the first task that fails or exits non-zero and reports its
    /// exit code.
    pub async fn run(&self, run_options: RunOptions, skip_prerequisites: bool) -> Result<SessionOutcome> {
        let order = TaskExecutionOrderResolver::new(&self.config)
            .resolve_execution_order(&run_options.task_name, skip_prerequisites)?;

        let run_options = Arc::new(run_options);
        let mut results = Vec::with_capacity(order.len());

        for task in order {
            if !run_options.is_main_task(&task.name) {
                info!(task = %task.name, main_task = %run_options.task_name, "running prerequisite task");
            }

            let result = self.task_runner.run(task, Arc::clone(&run_options)).await?;
            let exit_code = result.process_exit_code();
            results.push(result);

            if exit_code != 0 {
                info!(task = %task.name, exit_code, "task did not succeed, not running remaining tasks");
                return Ok(SessionOutcome { exit_code, results });
            }
        }

        Ok(SessionOutcome {
            exit_code: 0,
            results,
        })
    }
}
