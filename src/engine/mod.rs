// src/engine/mod.rs

//! Execution of tasks.
//!
//! - [`cancellation`]: one-shot broadcast that unwinds in-flight work.
//! - [`state_machine`]: owns the event log and current stage, decides what
//!   may run next.
//! - [`manager`]: runs ready steps concurrently until nothing is left.
//! - [`task_runner`]: wires the above together for one task.
//! - [`session`]: runs a task after its prerequisites.
//! - [`interrupt`]: maps Ctrl-C onto a task failure.

pub mod cancellation;
pub mod interrupt;
pub mod manager;
pub mod session;
pub mod state_machine;
pub mod task_runner;

pub use cancellation::{CancellationContext, CancellationRegistration};
pub use manager::ParallelExecutionManager;
pub use session::{SessionOutcome, SessionRunner};
pub use state_machine::{PostTaskManualCleanup, TaskEventSink, TaskStateMachine};
pub use task_runner::{TaskRunResult, TaskRunner};
