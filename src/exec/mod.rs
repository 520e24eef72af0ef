// src/exec/mod.rs

//! Step execution layer.
//!
//! The engine decides *what* runs; this module decides *how*. Every
//! [`TaskStep`](crate::model::steps::TaskStep) is handed to a
//! [`StepExecutor`], which reports the outcome as events.
//!
//! - [`backend`] defines the `StepExecutor` trait and the context passed to it.
//! - [`docker`] is the production executor built on the `docker` CLI.
//! - [`process`] wraps invocations of the CLI itself.
//! - [`proxy`] and [`current_user`] compute container settings derived
//!   from the host.

pub mod backend;
pub mod current_user;
pub mod docker;
pub mod process;
pub mod proxy;

pub use backend::{StepExecutor, StepRunContext};
pub use docker::DockerCliStepExecutor;
pub use process::{DockerCli, ProcessOutput};
