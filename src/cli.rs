// src/cli.rs

//! CLI argument parsing using `clap`.

use std::collections::{BTreeMap, BTreeSet};

use clap::{Parser, ValueEnum};

use crate::config::loader::default_config_path;
use crate::types::{CleanupOption, RunOptions};

/// Command-line arguments for `dockyard`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dockyard",
    version,
    about = "Run development tasks in containers, with their dependencies started first.",
    long_about = None
)]
pub struct CliArgs {
    /// The task to run.
    #[arg(value_name = "TASK", required_unless_present = "list_tasks")]
    pub task: Option<String>,

    /// Extra arguments appended to the task's command, given after `--`.
    #[arg(last = true, value_name = "ARGS")]
    pub additional_task_args: Vec<String>,

    /// Path to the config file (TOML).
    #[arg(short = 'f', long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config_file: std::path::PathBuf,

    /// List all tasks defined in the config file and exit.
    #[arg(long)]
    pub list_tasks: bool,

    /// Print the order tasks and containers would start in, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Leave containers and other resources behind if the task fails.
    #[arg(long)]
    pub no_cleanup_after_failure: bool,

    /// Leave containers and other resources behind if the task succeeds.
    #[arg(long)]
    pub no_cleanup_after_success: bool,

    /// Equivalent to both `--no-cleanup-after-failure` and `--no-cleanup-after-success`.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Don't pass the host's proxy environment variables to images and containers.
    #[arg(long)]
    pub no_proxy_vars: bool,

    /// Run only the given task, ignoring its prerequisites.
    #[arg(long)]
    pub skip_prerequisites: bool,

    /// Add a tag to a container's built image, as `container=tag`. Repeatable.
    #[arg(long = "tag-image", value_name = "CONTAINER=TAG", value_parser = parse_key_value)]
    pub tag_image: Vec<(String, String)>,

    /// Use an image instead of the configured one, as `container=image`. Repeatable.
    #[arg(long = "override-image", value_name = "CONTAINER=IMAGE", value_parser = parse_key_value)]
    pub override_image: Vec<(String, String)>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DOCKYARD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Options for running the requested task, or `None` when no task was given.
    pub fn run_options(&self) -> Option<RunOptions> {
        let task_name = self.task.clone()?;

        let cleanup = |disabled: bool| {
            if disabled || self.no_cleanup {
                CleanupOption::DontCleanup
            } else {
                CleanupOption::Cleanup
            }
        };

        let mut image_tags: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (container, tag) in &self.tag_image {
            image_tags
                .entry(container.clone())
                .or_default()
                .insert(tag.clone());
        }

        Some(RunOptions {
            additional_task_command_arguments: self.additional_task_args.clone(),
            behaviour_after_success: cleanup(self.no_cleanup_after_success),
            behaviour_after_failure: cleanup(self.no_cleanup_after_failure),
            propagate_proxy_environment_variables: !self.no_proxy_vars,
            image_tags,
            image_overrides: self.override_image.iter().cloned().collect(),
            ..RunOptions::new(task_name)
        })
    }
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() && !val.is_empty() => {
            Ok((key.to_string(), val.to_string()))
        }
        _ => Err(format!("expected 'container=value', got '{value}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
