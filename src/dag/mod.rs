// src/dag/mod.rs

//! Dependency graphs used before anything runs.
//!
//! - [`graph`] builds the validated graph of containers one task needs.
//! - [`overrides`] resolves each container's effective runtime settings.
//! - [`task_order`] expands a task into its prerequisite tasks.
//! - [`suggestions`] offers likely names when a task is misspelled.

pub mod graph;
pub mod overrides;
pub mod suggestions;
pub mod task_order;

pub use graph::{ContainerDependencyGraph, ContainerDependencyGraphNode};
pub use overrides::ContainerRuntimeConfiguration;
pub use task_order::TaskExecutionOrderResolver;
