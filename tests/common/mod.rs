#![allow(dead_code)]

use std::sync::Arc;

use dockyard::config::model::{ConfigFile, Task};
use dockyard::dag::ContainerDependencyGraph;
use dockyard::engine::{CancellationContext, TaskStateMachine};
use dockyard::model::stages::{CleanupStagePlanner, RunStagePlanner};
use dockyard::types::RunOptions;

pub use dockyard_test_utils::{
    ConfigFileBuilder, ContainerBuilder, FakeStepExecutor, RecordingEventLogger, TaskBuilder,
    init_tracing, with_timeout,
};

/// `app` runs the task and depends on `db`, which depends on `cache`.
pub fn app_with_db_and_cache() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_container(
            ContainerBuilder::new("app")
                .build_directory("/project/app")
                .command("run-app")
                .depends_on("db")
                .build(),
        )
        .with_container(
            ContainerBuilder::new("db")
                .image("postgres:16")
                .depends_on("cache")
                .setup_command("migrate --all")
                .build(),
        )
        .with_container(ContainerBuilder::new("cache").image("redis:7").build())
        .with_task(TaskBuilder::new("test", "app").build())
        .build()
}

pub fn task<'a>(config: &'a ConfigFile, name: &str) -> &'a Task {
    config.task(name).expect("task exists in test config")
}

pub fn graph_for(config: &ConfigFile, task_name: &str) -> ContainerDependencyGraph {
    ContainerDependencyGraph::new(config, task(config, task_name), &RunOptions::new(task_name))
        .expect("graph builds")
}

/// A state machine for `task_name`, sharing the returned cancellation context.
pub fn state_machine_for(
    config: &ConfigFile,
    task_name: &str,
    run_options: RunOptions,
) -> (TaskStateMachine, CancellationContext) {
    let graph = Arc::new(
        ContainerDependencyGraph::new(config, task(config, task_name), &run_options)
            .expect("graph builds"),
    );
    let run_stage = RunStagePlanner::new(&config.project_name).create_stage(&graph, &run_options);
    let cancellation = CancellationContext::new();

    let machine = TaskStateMachine::new(
        graph,
        Arc::new(run_options),
        run_stage,
        CleanupStagePlanner::new(),
        cancellation.clone(),
    );

    (machine, cancellation)
}
