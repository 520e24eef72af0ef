// src/model/mod.rs

//! The vocabulary of a task run.
//!
//! - [`events`]: facts recorded during a run, and the append-only log.
//! - [`steps`]: units of side-effecting work handed to a step executor.
//! - [`rules`]: conditions under which a step becomes ready.
//! - [`stages`]: the run and cleanup stages, and the planners that build
//!   them from a container graph.
//! - [`resources`]: identifiers of things created in the container runtime.

pub mod events;
pub mod resources;
pub mod rules;
pub mod stages;
pub mod steps;

pub use events::{EventLog, TaskEvent, TaskFailure};
pub use resources::{DockerContainer, DockerImage, DockerNetwork};
pub use rules::{TaskStepRule, TaskStepRuleEvaluationResult};
pub use stages::{CleanupStage, NextStepResult, RunStage, Stage};
pub use steps::TaskStep;
