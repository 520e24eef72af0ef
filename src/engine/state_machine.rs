// src/engine/state_machine.rs

//! The single point that decides which step may run next.
//!
//! All mutable state of a task run (event log, current stage, failure
//! flags, manual cleanup instructions) lives behind one lock, so posting an
//! event and popping the next step never interleave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::dag::graph::ContainerDependencyGraph;
use crate::engine::cancellation::CancellationContext;
use crate::errors::SchedulerInvariantViolation;
use crate::model::events::{EventLog, TaskEvent};
use crate::model::stages::{CleanupStagePlanner, NextStepResult, RunStage, Stage};
use crate::model::steps::TaskStep;
use crate::types::{CleanupOption, RunOptions};

/// Whether a human needs to clean up after the task, and how.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PostTaskManualCleanup {
    #[default]
    NotRequired,
    DueToCleanupFailure { commands: Vec<String> },
    DueToTaskFailureWithCleanupDisabled { commands: Vec<String> },
    DueToTaskSuccessWithCleanupDisabled { commands: Vec<String> },
}

impl PostTaskManualCleanup {
    pub fn is_required(&self) -> bool {
        !matches!(self, PostTaskManualCleanup::NotRequired)
    }

    pub fn commands(&self) -> &[String] {
        match self {
            PostTaskManualCleanup::NotRequired => &[],
            PostTaskManualCleanup::DueToCleanupFailure { commands }
            | PostTaskManualCleanup::DueToTaskFailureWithCleanupDisabled { commands }
            | PostTaskManualCleanup::DueToTaskSuccessWithCleanupDisabled { commands } => commands,
        }
    }
}

/// Anything that accepts task events.
pub trait TaskEventSink: Send + Sync {
    fn post_event(&self, event: TaskEvent);
}

#[derive(Debug)]
struct MachineState {
    events: EventLog,
    stage: Stage,
    task_has_failed: bool,
    task_failed_during_cleanup: bool,
    complete: bool,
    manual_cleanup: PostTaskManualCleanup,
}

#[derive(Debug)]
pub struct TaskStateMachine {
    graph: Arc<ContainerDependencyGraph>,
    run_options: Arc<RunOptions>,
    cleanup_planner: CleanupStagePlanner,
    cancellation: CancellationContext,
    state: Mutex<MachineState>,
}

impl TaskStateMachine {
    pub fn new(
        graph: Arc<ContainerDependencyGraph>,
        run_options: Arc<RunOptions>,
        run_stage: RunStage,
        cleanup_planner: CleanupStagePlanner,
        cancellation: CancellationContext,
    ) -> Self {
        Self {
            graph,
            run_options,
            cleanup_planner,
            cancellation,
            state: Mutex::new(MachineState {
                events: EventLog::new(),
                stage: Stage::Run(run_stage),
                task_has_failed: false,
                task_failed_during_cleanup: false,
                complete: false,
                manual_cleanup: PostTaskManualCleanup::NotRequired,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next step to run, or `None` if nothing can start right now (or
    /// ever again).
    ///
    /// Returns an error if nothing is ready, nothing is running and the
    /// task has not failed during cleanup: the remaining work waits for
    /// events that can never arrive.
    pub fn pop_next_step(
        &self,
        steps_still_running: bool,
    ) -> Result<Option<TaskStep>, SchedulerInvariantViolation> {
        let mut state = self.state();

        loop {
            if state.complete {
                return Ok(None);
            }

            if state.task_has_failed && matches!(state.stage, Stage::Run(_)) {
                if steps_still_running {
                    debug!("task has failed, waiting for running steps to finish before cleaning up");
                    return Ok(None);
                }

                if !self.enter_cleanup_stage(&mut state) {
                    return Ok(None);
                }
                continue;
            }

            let MachineState { events, stage, .. } = &mut *state;
            match stage.pop_next_step(events, steps_still_running) {
                NextStepResult::StepReady(step) => {
                    debug!(stage = stage.name(), step = %step, "step ready");
                    return Ok(Some(step));
                }
                NextStepResult::NoStepsReady => {
                    return self.handle_no_steps_ready(&mut state, steps_still_running);
                }
                NextStepResult::NoStepsRemaining => {
                    if steps_still_running {
                        return Ok(None);
                    }

                    match state.stage {
                        Stage::Run(_) => {
                            if !self.enter_cleanup_stage(&mut state) {
                                return Ok(None);
                            }
                        }
                        Stage::Cleanup(_) => {
                            info!(task = %self.graph.task_name(), "cleanup stage complete");
                            state.complete = true;
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    fn handle_no_steps_ready(
        &self,
        state: &mut MachineState,
        steps_still_running: bool,
    ) -> Result<Option<TaskStep>, SchedulerInvariantViolation> {
        if steps_still_running || state.task_failed_during_cleanup {
            return Ok(None);
        }

        state.task_has_failed = true;
        error!(
            task = %self.graph.task_name(),
            stage = state.stage.name(),
            "no steps ready and none running; the stage can never make progress"
        );
        Err(SchedulerInvariantViolation::NoStepsReadyAndNoneRunning)
    }

    /// Switch to cleanup, or finish if cleanup is disabled for this outcome.
    /// Returns true if the cleanup stage is now active.
    fn enter_cleanup_stage(&self, state: &mut MachineState) -> bool {
        let cleanup = self.cleanup_planner.create_stage(&self.graph, &state.events);
        let commands = cleanup.manual_cleanup_commands().to_vec();

        if state.task_has_failed
            && self.run_options.behaviour_after_failure == CleanupOption::DontCleanup
            && state.events.any_container_created()
        {
            info!(task = %self.graph.task_name(), "task failed and cleanup after failure is disabled, skipping cleanup");
            state.manual_cleanup = PostTaskManualCleanup::DueToTaskFailureWithCleanupDisabled { commands };
            state.complete = true;
            return false;
        }

        if !state.task_has_failed
            && self.run_options.behaviour_after_success == CleanupOption::DontCleanup
        {
            info!(task = %self.graph.task_name(), "cleanup after success is disabled, skipping cleanup");
            state.manual_cleanup = PostTaskManualCleanup::DueToTaskSuccessWithCleanupDisabled { commands };
            state.complete = true;
            return false;
        }

        info!(task = %self.graph.task_name(), failed = state.task_has_failed, "starting cleanup stage");
        state.stage = Stage::Cleanup(cleanup);
        true
    }

    /// Record `event`. Failure events flip the task into its failure path:
    /// during the run stage they also cancel in-flight work.
    pub fn post_event(&self, event: TaskEvent) {
        let should_cancel = {
            let mut state = self.state();
            let is_failure = event.is_failure();

            if !state.events.add(event.clone()) {
                debug!(?event, "ignoring duplicate event");
                return;
            }

            if !is_failure {
                false
            } else if let Stage::Cleanup(cleanup) = &state.stage {
                warn!(?event, "failure during cleanup");
                let commands = cleanup.manual_cleanup_commands().to_vec();
                state.manual_cleanup = PostTaskManualCleanup::DueToCleanupFailure { commands };
                state.task_failed_during_cleanup = true;
                state.task_has_failed = true;
                false
            } else {
                warn!(?event, "task failed, cancelling in-flight operations");
                state.task_has_failed = true;
                true
            }
        };

        if should_cancel {
            self.cancellation.cancel();
        }
    }

    pub fn task_has_failed(&self) -> bool {
        self.state().task_has_failed
    }

    pub fn task_failed_during_cleanup(&self) -> bool {
        self.state().task_failed_during_cleanup
    }

    pub fn is_complete(&self) -> bool {
        self.state().complete
    }

    pub fn post_task_manual_cleanup(&self) -> PostTaskManualCleanup {
        self.state().manual_cleanup.clone()
    }

    /// Exit code of the task container, once it has run to completion.
    pub fn task_exit_code(&self) -> Result<i64, SchedulerInvariantViolation> {
        self.state()
            .events
            .exit_code_of(self.graph.task_container_name())
            .ok_or(SchedulerInvariantViolation::TaskNotFinished)
    }

    pub fn all_events(&self) -> Vec<TaskEvent> {
        self.state().events.to_vec()
    }

    pub fn graph(&self) -> &ContainerDependencyGraph {
        &self.graph
    }
}

impl TaskEventSink for TaskStateMachine {
    fn post_event(&self, event: TaskEvent) {
        TaskStateMachine::post_event(self, event);
    }
}
