// tests/session.rs

mod common;
use crate::common::{
    ConfigFileBuilder, ContainerBuilder, FakeStepExecutor, RecordingEventLogger, TaskBuilder,
    with_timeout,
};

use std::sync::Arc;

use dockyard::config::model::ConfigFile;
use dockyard::engine::{SessionOutcome, SessionRunner};
use dockyard::errors::{DockyardError, Result, TaskOrderError};
use dockyard::engine::state_machine::PostTaskManualCleanup;
use dockyard::types::{CleanupOption, RunOptions};

/// `test` needs `build`, which needs `lint`; `all` only has prerequisites.
fn project() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_container(ContainerBuilder::new("builder").image("rust:1").build())
        .with_container(ContainerBuilder::new("linter").image("clippy:1").build())
        .with_container(ContainerBuilder::new("app").image("app:dev").build())
        .with_task(TaskBuilder::new("lint", "linter").build())
        .with_task(TaskBuilder::new("build", "builder").prerequisite("lint").build())
        .with_task(TaskBuilder::new("test", "app").prerequisite("build").build())
        .with_task(
            TaskBuilder::prerequisites_only("all")
                .prerequisite("test")
                .build(),
        )
        .build()
}

async fn run_session(
    fake: &FakeStepExecutor,
    logger: &Arc<RecordingEventLogger>,
    task_name: &str,
    skip_prerequisites: bool,
) -> Result<SessionOutcome> {
    run_session_with(fake, logger, RunOptions::new(task_name), skip_prerequisites).await
}

async fn run_session_with(
    fake: &FakeStepExecutor,
    logger: &Arc<RecordingEventLogger>,
    run_options: RunOptions,
    skip_prerequisites: bool,
) -> Result<SessionOutcome> {
    let runner = SessionRunner::new(Arc::new(project()), Arc::new(fake.clone()), logger.clone());
    with_timeout(runner.run(run_options, skip_prerequisites)).await
}

fn task_names(outcome: &SessionOutcome) -> Vec<&str> {
    outcome.results.iter().map(|r| r.task_name.as_str()).collect()
}

#[tokio::test]
async fn prerequisites_run_before_the_main_task() {
    let fake = FakeStepExecutor::new();
    let logger = Arc::new(RecordingEventLogger::new());

    let outcome = run_session(&fake, &logger, "test", false).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(task_names(&outcome), ["lint", "build", "test"]);
    assert_eq!(logger.started_tasks(), ["lint", "build", "test"]);

    let runs: Vec<_> = fake
        .step_names()
        .into_iter()
        .filter(|s| s.starts_with("RunContainer"))
        .collect();
    assert_eq!(runs, ["RunContainer(linter)", "RunContainer(builder)", "RunContainer(app)"]);
}

#[tokio::test]
async fn skipping_prerequisites_runs_only_the_main_task() {
    let fake = FakeStepExecutor::new();
    let logger = Arc::new(RecordingEventLogger::new());

    let outcome = run_session(&fake, &logger, "test", true).await.unwrap();

    assert_eq!(task_names(&outcome), ["test"]);
}

#[tokio::test]
async fn failing_prerequisite_stops_the_session() {
    let fake = FakeStepExecutor::new().fail_step("RunContainer", Some("builder"));
    let logger = Arc::new(RecordingEventLogger::new());

    let outcome = run_session(&fake, &logger, "test", false).await.unwrap();

    assert_eq!(outcome.exit_code, -1);
    assert_eq!(task_names(&outcome), ["lint", "build"]);
    assert!(fake.position_of("CreateContainer(app)").is_none());
    assert_eq!(logger.failed_tasks().len(), 1);
}

#[tokio::test]
async fn non_zero_exit_code_stops_the_session_with_that_code() {
    let fake = FakeStepExecutor::new().with_exit_code(4);
    let logger = Arc::new(RecordingEventLogger::new());

    let outcome = run_session(&fake, &logger, "test", false).await.unwrap();

    assert_eq!(outcome.exit_code, 4);
    assert_eq!(task_names(&outcome), ["lint"]);
}

#[tokio::test]
async fn leaving_containers_running_after_success_stops_the_session() {
    let fake = FakeStepExecutor::new();
    let logger = Arc::new(RecordingEventLogger::new());
    let run_options = RunOptions {
        behaviour_after_success: CleanupOption::DontCleanup,
        ..RunOptions::new("test")
    };

    let outcome = run_session_with(&fake, &logger, run_options, false)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code, -1);
    assert_eq!(task_names(&outcome), ["lint"]);
    assert!(!outcome.results[0].task_failed);
    assert!(matches!(
        outcome.results[0].manual_cleanup,
        PostTaskManualCleanup::DueToTaskSuccessWithCleanupDisabled { .. }
    ));
    assert!(fake.position_of("CreateContainer(builder)").is_none());
    assert!(fake.position_of("StopContainer(linter)").is_none());
}

#[tokio::test]
async fn prerequisite_only_task_succeeds_after_its_prerequisites() {
    let fake = FakeStepExecutor::new();
    let logger = Arc::new(RecordingEventLogger::new());

    let outcome = run_session(&fake, &logger, "all", false).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(task_names(&outcome), ["lint", "build", "test", "all"]);
    assert_eq!(logger.prerequisite_only_tasks(), ["all"]);
}

#[tokio::test]
async fn unknown_task_fails_before_anything_runs() {
    let fake = FakeStepExecutor::new();
    let logger = Arc::new(RecordingEventLogger::new());

    let err = run_session(&fake, &logger, "tset", false)
        .await
        .expect_err("unknown task");

    assert!(matches!(
        err,
        DockyardError::TaskOrder(TaskOrderError::TaskDoesNotExist { ref task, .. }) if task == "tset"
    ));
    assert!(fake.steps().is_empty());
}
