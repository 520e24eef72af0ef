// tests/runtime_overrides.rs

mod common;
use crate::common::{ConfigFileBuilder, ContainerBuilder, TaskBuilder, graph_for, task};

use std::collections::{BTreeMap, BTreeSet};

use dockyard::config::command::{Command, PortMapping};
use dockyard::config::model::TaskContainerCustomisation;
use dockyard::dag::{ContainerDependencyGraph, ContainerRuntimeConfiguration};
use dockyard::types::RunOptions;

fn parsed(command: &Option<Command>) -> Vec<String> {
    command
        .as_ref()
        .map(|c| c.parsed().to_vec())
        .unwrap_or_default()
}

fn config_with_overrides() -> dockyard::config::model::ConfigFile {
    ConfigFileBuilder::new()
        .with_container(
            ContainerBuilder::new("app")
                .command("serve")
                .entrypoint("/bin/sh -c")
                .working_directory("/app")
                .depends_on("db")
                .build(),
        )
        .with_container(
            ContainerBuilder::new("db")
                .command("postgres")
                .working_directory("/var/lib/db")
                .build(),
        )
        .with_task(
            TaskBuilder::new("test", "app")
                .command("cargo test")
                .entrypoint("/entry")
                .working_directory("/code")
                .env("RUST_LOG", "debug")
                .port(3000, 3000)
                .customise(
                    "db",
                    TaskContainerCustomisation {
                        working_directory: Some("/tmp/db".to_string()),
                        additional_environment_variables: BTreeMap::from([(
                            "POSTGRES_DB".to_string(),
                            "test".to_string(),
                        )]),
                        additional_port_mappings: BTreeSet::from([PortMapping::new(5433, 5432)]),
                    },
                )
                .build(),
        )
        .with_task(TaskBuilder::new("serve", "app").build())
        .build()
}

#[test]
fn task_container_takes_settings_from_the_run_configuration() {
    let config = config_with_overrides();
    let graph = graph_for(&config, "test");
    let app = &graph.task_container_node().config;

    assert_eq!(parsed(&app.command), vec!["cargo", "test"]);
    assert_eq!(parsed(&app.entrypoint), vec!["/entry"]);
    assert_eq!(app.working_directory.as_deref(), Some("/code"));
    assert_eq!(
        app.additional_environment_variables.get("RUST_LOG").map(String::as_str),
        Some("debug")
    );
    assert!(app.additional_port_mappings.contains(&PortMapping::new(3000, 3000)));
}

#[test]
fn task_container_falls_back_to_container_settings() {
    let config = config_with_overrides();
    let graph = graph_for(&config, "serve");
    let app = &graph.task_container_node().config;

    assert_eq!(parsed(&app.command), vec!["serve"]);
    assert_eq!(parsed(&app.entrypoint), vec!["/bin/sh", "-c"]);
    assert_eq!(app.working_directory.as_deref(), Some("/app"));
    assert!(app.additional_environment_variables.is_empty());
    assert!(app.additional_port_mappings.is_empty());
}

#[test]
fn dependency_takes_settings_from_the_task_customisation() {
    let config = config_with_overrides();
    let graph = graph_for(&config, "test");
    let db = &graph.node_for("db").unwrap().config;

    assert_eq!(parsed(&db.command), vec!["postgres"]);
    assert_eq!(db.working_directory.as_deref(), Some("/tmp/db"));
    assert_eq!(
        db.additional_environment_variables.get("POSTGRES_DB").map(String::as_str),
        Some("test")
    );
    assert!(db.additional_port_mappings.contains(&PortMapping::new(5433, 5432)));
}

#[test]
fn dependency_without_customisation_keeps_its_own_working_directory() {
    let config = config_with_overrides();
    let graph = graph_for(&config, "serve");
    let db = &graph.node_for("db").unwrap().config;

    assert_eq!(db.working_directory.as_deref(), Some("/var/lib/db"));
    assert!(db.additional_environment_variables.is_empty());
}

#[test]
fn additional_arguments_are_appended_to_the_main_task_command_only() {
    let config = config_with_overrides();
    let run_options = RunOptions {
        additional_task_command_arguments: vec!["--nocapture".to_string(), "a b".to_string()],
        ..RunOptions::new("test")
    };

    let graph = ContainerDependencyGraph::new(&config, task(&config, "test"), &run_options).unwrap();

    let app = &graph.task_container_node().config;
    assert_eq!(parsed(&app.command), vec!["cargo", "test", "--nocapture", "a b"]);
    assert_eq!(
        app.command.as_ref().map(Command::original),
        Some("cargo test --nocapture 'a b'")
    );

    // Entrypoints and dependencies never receive the arguments.
    assert_eq!(parsed(&app.entrypoint), vec!["/entry"]);
    assert_eq!(parsed(&graph.node_for("db").unwrap().config.command), vec!["postgres"]);
}

#[test]
fn resolve_can_be_used_without_building_a_graph() {
    let config = config_with_overrides();
    let app = config.container("app").unwrap();

    let resolved =
        ContainerRuntimeConfiguration::resolve(app, task(&config, "serve"), true, &RunOptions::new("serve"))
            .unwrap();

    assert_eq!(parsed(&resolved.command), vec!["serve"]);
    assert_eq!(resolved.working_directory.as_deref(), Some("/app"));
}
