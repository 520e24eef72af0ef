// tests/task_order.rs

mod common;
use crate::common::{ConfigFileBuilder, TaskBuilder};

use dockyard::config::model::ConfigFile;
use dockyard::dag::TaskExecutionOrderResolver;
use dockyard::dag::suggestions::{format_suggestions, human_readable_list, suggest_corrections};
use dockyard::errors::TaskOrderError;

/// Tasks as `(name, "space separated prerequisites")`.
fn config_with(tasks: &[(&str, &str)]) -> ConfigFile {
    tasks
        .iter()
        .fold(ConfigFileBuilder::new(), |builder, &(name, prerequisites)| {
            let task = prerequisites
                .split_whitespace()
                .fold(TaskBuilder::prerequisites_only(name), |t, p| t.prerequisite(p));
            builder.with_task(task.build())
        })
        .build()
}

fn order(config: &ConfigFile, task: &str) -> Vec<String> {
    TaskExecutionOrderResolver::new(config)
        .resolve_execution_order(task, false)
        .expect("order resolves")
        .into_iter()
        .map(|t| t.name.clone())
        .collect()
}

fn order_error(config: &ConfigFile, task: &str) -> TaskOrderError {
    TaskExecutionOrderResolver::new(config)
        .resolve_execution_order(task, false)
        .expect_err("order resolution should fail")
}

#[test]
fn task_without_prerequisites_runs_alone() {
    let config = config_with(&[("build", "")]);
    assert_eq!(order(&config, "build"), vec!["build"]);
}

#[test]
fn shared_prerequisite_runs_once_before_everything_that_needs_it() {
    let config = config_with(&[
        ("A", "B C"),
        ("B", "D"),
        ("C", "D"),
        ("D", ""),
    ]);

    assert_eq!(order(&config, "A"), vec!["D", "B", "C", "A"]);
}

#[test]
fn prerequisites_keep_declaration_order() {
    let config = config_with(&[("all", "lint build test"), ("lint", ""), ("build", ""), ("test", "build")]);

    assert_eq!(order(&config, "all"), vec!["lint", "build", "test", "all"]);
}

#[test]
fn repeated_prerequisite_is_not_run_twice() {
    let config = config_with(&[("all", "build build"), ("build", "")]);
    assert_eq!(order(&config, "all"), vec!["build", "all"]);
}

#[test]
fn skip_prerequisites_returns_only_the_requested_task() {
    let config = config_with(&[("A", "B"), ("B", "")]);

    let tasks = TaskExecutionOrderResolver::new(&config)
        .resolve_execution_order("A", true)
        .unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "A");
}

#[test]
fn unknown_task_suggests_close_names() {
    let config = config_with(&[("test", ""), ("tests", ""), ("build", "")]);

    let err = order_error(&config, "tst");
    assert_eq!(
        err.to_string(),
        "The task 'tst' does not exist. Did you mean 'test' or 'tests'? (Run 'dockyard --list-tasks' for a list of all tasks in this project, or 'dockyard --help' for help.)"
    );
}

#[test]
fn unknown_task_without_close_names_has_no_suggestion() {
    let config = config_with(&[("build", "")]);

    let err = order_error(&config, "deploy-to-production");
    assert_eq!(
        err.to_string(),
        "The task 'deploy-to-production' does not exist. (Run 'dockyard --list-tasks' for a list of all tasks in this project, or 'dockyard --help' for help.)"
    );
}

#[test]
fn unknown_prerequisite_names_the_task_that_needs_it() {
    let config = config_with(&[("test", "buidl"), ("build", "")]);

    let err = order_error(&config, "test");
    assert_eq!(
        err.to_string(),
        "The task 'buidl' given as a prerequisite of 'test' does not exist. Did you mean 'build'?"
    );
}

#[test]
fn prerequisite_cycle_is_described() {
    let config = config_with(&[("a", "b"), ("b", "a")]);

    let err = order_error(&config, "a");
    assert_eq!(
        err.to_string(),
        "There is a dependency cycle between tasks: task 'a' has 'b' as a prerequisite, which has 'a' as a prerequisite."
    );

    match err {
        TaskOrderError::DependencyCycle { path, .. } => assert_eq!(path, vec!["a", "b", "a"]),
        other => panic!("expected dependency cycle, got {other:?}"),
    }
}

#[test]
fn longer_prerequisite_cycle_is_described() {
    let config = config_with(&[("a", "b"), ("b", "c"), ("c", "a")]);

    let err = order_error(&config, "a");
    assert_eq!(
        err.to_string(),
        "There is a dependency cycle between tasks: task 'a' has 'b' as a prerequisite, which has 'c' as a prerequisite, which has 'a' as a prerequisite."
    );
}

#[test]
fn wildcard_prerequisite_matches_tasks_in_name_order() {
    let config = config_with(&[
        ("all", "lint:*"),
        ("lint:toml", ""),
        ("lint:rust", ""),
        ("test", ""),
    ]);

    assert_eq!(order(&config, "all"), vec!["lint:rust", "lint:toml", "all"]);
}

#[test]
fn wildcard_matching_nothing_is_not_an_error() {
    let config = config_with(&[("all", "deploy*"), ("build", "")]);
    assert_eq!(order(&config, "all"), vec!["all"]);
}

#[test]
fn wildcard_treats_other_regex_characters_literally() {
    let config = config_with(&[("all", "a.*"), ("a.c", ""), ("abc", "")]);
    assert_eq!(order(&config, "all"), vec!["a.c", "all"]);
}

#[test]
fn suggestions_are_ordered_by_distance_then_name() {
    let candidates = ["lint", "link", "line", "lin", "build"];
    let suggestions = suggest_corrections(candidates, "lin");

    assert_eq!(suggestions, vec!["line", "link", "lint"]);
}

#[test]
fn suggestions_skip_names_that_are_too_far_away() {
    let suggestions = suggest_corrections(["integration-test", "unit"], "unti");
    assert_eq!(suggestions, vec!["unit"]);
}

#[test]
fn suggestions_are_formatted_as_a_question() {
    assert_eq!(format_suggestions(&[]), "");
    assert_eq!(format_suggestions(&["a".to_string()]), " Did you mean 'a'?");
    assert_eq!(
        format_suggestions(&["a".to_string(), "b".to_string()]),
        " Did you mean 'a' or 'b'?"
    );
    assert_eq!(
        format_suggestions(&["a".to_string(), "b".to_string(), "c".to_string()]),
        " Did you mean 'a', 'b' or 'c'?"
    );
}

#[test]
fn human_readable_list_joins_with_conjunction() {
    let items: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();

    assert_eq!(human_readable_list(&items, "and"), "x, y and z");
    assert_eq!(human_readable_list(&items[..1], "and"), "x");
    assert_eq!(human_readable_list(&[], "and"), "");
}
