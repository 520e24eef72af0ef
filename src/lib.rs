// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod model;
pub mod types;
pub mod ui;

use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{ContainerDependencyGraph, TaskExecutionOrderResolver};
use crate::engine::SessionRunner;
use crate::errors::{DockyardError, Result};
use crate::exec::DockerCliStepExecutor;
use crate::fs::RealFileSystem;
use crate::types::RunOptions;
use crate::ui::ConsoleEventLogger;

/// High-level entry point used by `main.rs`.
///
/// Loads the config file and then lists tasks, prints a dry run, or runs
/// the requested task and its prerequisites. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = load_and_validate(&args.config_file)?;

    if args.list_tasks {
        print_task_list(&config);
        return Ok(0);
    }

    let Some(run_options) = args.run_options() else {
        return Err(DockyardError::ConfigError(
            "No task name provided. Run 'dockyard --list-tasks' for a list of all tasks in this project.".to_string(),
        ));
    };

    if args.dry_run {
        print_dry_run(&config, &run_options, args.skip_prerequisites)?;
        return Ok(0);
    }

    let config = Arc::new(config);
    let executor = DockerCliStepExecutor::new(config.project_name.clone(), Arc::new(RealFileSystem));
    debug!(run_id = executor.run_id(), "created docker executor");

    let session = SessionRunner::new(config, Arc::new(executor), Arc::new(ConsoleEventLogger::new()))
        .with_interrupt_trap(true);

    let outcome = session.run(run_options, args.skip_prerequisites).await?;
    info!(exit_code = outcome.exit_code, tasks_run = outcome.results.len(), "session finished");
    Ok(outcome.exit_code)
}

/// Tasks sorted by name, with descriptions where given.
fn print_task_list(config: &ConfigFile) {
    println!("Available tasks:");
    for (name, task) in &config.tasks {
        if task.description.is_empty() {
            println!("- {name}");
        } else {
            println!("- {name}: {}", task.description);
        }
    }
}

/// Task order and, per task, container startup order. Nothing is run.
fn print_dry_run(config: &ConfigFile, run_options: &RunOptions, skip_prerequisites: bool) -> Result<()> {
    let order = TaskExecutionOrderResolver::new(config)
        .resolve_execution_order(&run_options.task_name, skip_prerequisites)?;

    println!("dockyard dry-run ({})", config.project_name);
    println!();

    for (index, task) in order.iter().enumerate() {
        println!("{}. {}", index + 1, task.name);

        if task.run_configuration.is_none() {
            println!("      only has prerequisites");
            continue;
        }

        let graph = ContainerDependencyGraph::new(config, task, run_options)?;
        for node in graph.startup_order() {
            let role = if node.is_root_node { " (task container)" } else { "" };
            match &node.config.command {
                Some(command) => println!("      - {}{role}: {command}", node.name()),
                None => println!("      - {}{role}", node.name()),
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
