// src/engine/manager.rs

//! Runs ready steps concurrently until the state machine has nothing left.
//!
//! Every ready step gets its own tokio task; there is no pool limit. The
//! running-step counter and the fatal error slot share one lock, and the
//! caller of [`ParallelExecutionManager::run`] waits on a `watch` latch
//! that flips once the counter is back at zero with nothing new to start.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::cancellation::CancellationContext;
use crate::engine::state_machine::{TaskEventSink, TaskStateMachine};
use crate::errors::SchedulerInvariantViolation;
use crate::exec::backend::{StepExecutor, StepRunContext};
use crate::model::events::TaskEvent;
use crate::model::steps::TaskStep;
use crate::types::RunOptions;
use crate::ui::EventLogger;

#[derive(Debug, Default)]
struct WorkState {
    running: usize,
    fatal: Option<SchedulerInvariantViolation>,
    unhandled_failures: Vec<String>,
}

pub struct ParallelExecutionManager {
    event_logger: Arc<dyn EventLogger>,
    step_executor: Arc<dyn StepExecutor>,
    state_machine: Arc<TaskStateMachine>,
    run_options: Arc<RunOptions>,
    cancellation: CancellationContext,
    work: Mutex<WorkState>,
    finished: watch::Sender<bool>,
    this: Weak<ParallelExecutionManager>,
}

impl ParallelExecutionManager {
    pub fn new(
        event_logger: Arc<dyn EventLogger>,
        step_executor: Arc<dyn StepExecutor>,
        state_machine: Arc<TaskStateMachine>,
        run_options: Arc<RunOptions>,
        cancellation: CancellationContext,
    ) -> Arc<Self> {
        let (finished, _) = watch::channel(false);

        Arc::new_cyclic(|this| Self {
            event_logger,
            step_executor,
            state_machine,
            run_options,
            cancellation,
            work: Mutex::new(WorkState::default()),
            finished,
            this: this.clone(),
        })
    }

    fn work(&self) -> MutexGuard<'_, WorkState> {
        self.work.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start everything that is ready and wait until all work is done.
    ///
    /// Step failures are not errors here; they end up in the state machine.
    /// An error means the scheduler hit an impossible state.
    pub async fn run(&self) -> Result<(), SchedulerInvariantViolation> {
        let mut finished = self.finished.subscribe();

        self.start_new_work_if_possible();

        // The sender lives as long as `self`, so this only fails if the
        // manager is torn down mid-wait.
        if finished.wait_for(|done| *done).await.is_err() {
            warn!("execution manager latch closed before work finished");
        }

        match self.work().fatal.take() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Messages of failures that escaped a step executor.
    pub fn unhandled_failures(&self) -> Vec<String> {
        self.work().unhandled_failures.clone()
    }

    fn start_new_work_if_possible(&self) {
        let mut work = self.work();
        self.schedule(&mut work);
    }

    fn schedule(&self, work: &mut WorkState) {
        if work.fatal.is_none() {
            loop {
                match self.state_machine.pop_next_step(work.running > 0) {
                    Ok(Some(step)) => {
                        work.running += 1;
                        self.spawn_step(step);
                    }
                    Ok(None) => break,
                    Err(violation) => {
                        error!(error = %violation, "could not schedule new work");
                        self.event_logger.post_event(&TaskEvent::execution_failed(format!(
                            "Could not schedule new work: {violation}"
                        )));
                        work.fatal = Some(violation);
                        break;
                    }
                }
            }
        }

        if work.running == 0 {
            info!("no running steps, signalling execution manager to stop");
            self.finished.send_replace(true);
        }
    }

    fn spawn_step(&self, step: TaskStep) {
        let Some(manager) = self.this.upgrade() else {
            return;
        };

        tokio::spawn(async move {
            manager.run_step(step).await;
        });
    }

    async fn run_step(self: Arc<Self>, step: TaskStep) {
        let kind = step.kind();
        debug!(step = %step, "starting step");

        self.event_logger.post_event(&TaskEvent::StepStarting { step: step.clone() });

        let context = StepRunContext {
            events: self.clone(),
            run_options: Arc::clone(&self.run_options),
            cancellation: self.cancellation.clone(),
        };
        let executor = Arc::clone(&self.step_executor);

        // The inner task turns a panicking executor into a join error.
        let outcome = tokio::spawn(async move { executor.run(step, context).await }).await;

        let failure = match outcome {
            Ok(Ok(())) => {
                debug!(step = kind, "step completed");
                None
            }
            Ok(Err(err)) if err.is_cancellation() => {
                info!(step = kind, "step cancelled");
                None
            }
            Ok(Err(err)) => Some(format!("{err:#}")),
            Err(join_error) if join_error.is_cancelled() => {
                info!(step = kind, "step task was cancelled");
                None
            }
            Err(join_error) => Some(format!("step panicked: {join_error}")),
        };

        if let Some(message) = failure {
            error!(step = kind, error = %message, "unhandled failure during step");
            self.work().unhandled_failures.push(message.clone());
            self.post_event(TaskEvent::execution_failed(format!(
                "During execution of step of kind '{kind}': {message}"
            )));
        }

        let mut work = self.work();
        work.running -= 1;
        self.schedule(&mut work);
    }
}

impl TaskEventSink for ParallelExecutionManager {
    fn post_event(&self, event: TaskEvent) {
        self.event_logger.post_event(&event);

        if event.is_informational() {
            return;
        }

        self.state_machine.post_event(event);
        self.start_new_work_if_possible();
    }
}
