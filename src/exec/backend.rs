// src/exec/backend.rs

//! Pluggable step executor abstraction.
//!
//! The execution manager hands every ready step to a `StepExecutor`. The
//! executor performs the side effect and reports what happened by posting
//! events through the context it is given:
//!
//! - exactly one terminal event per step (a success variant or a
//!   [`TaskEvent::Failed`]), plus any number of informational events;
//! - returning `Err` is reserved for failures the executor could not turn
//!   into an event, and for cancellation (see [`Cancelled`](crate::errors::Cancelled)).
//!
//! Production code uses [`DockerCliStepExecutor`](super::docker::DockerCliStepExecutor);
//! tests provide fakes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::cancellation::CancellationContext;
use crate::engine::state_machine::TaskEventSink;
use crate::errors::Result;
use crate::model::events::TaskEvent;
use crate::model::steps::TaskStep;
use crate::types::RunOptions;

/// Everything a step needs from the run it belongs to.
#[derive(Clone)]
pub struct StepRunContext {
    pub events: Arc<dyn TaskEventSink>,
    pub run_options: Arc<RunOptions>,
    pub cancellation: CancellationContext,
}

impl StepRunContext {
    pub fn post(&self, event: impl Into<TaskEvent>) {
        self.events.post_event(event.into());
    }
}

impl fmt::Debug for StepRunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRunContext")
            .field("run_options", &self.run_options)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

pub trait StepExecutor: Send + Sync {
    fn run<'a>(
        &'a self,
        step: TaskStep,
        context: StepRunContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
