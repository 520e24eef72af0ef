// tests/messages.rs

use std::path::PathBuf;

use dockyard::config::command::Command;
use dockyard::config::model::BuildImageSource;
use dockyard::engine::PostTaskManualCleanup;
use dockyard::model::events::{TaskEvent, TaskFailure};
use dockyard::model::resources::DockerContainer;
use dockyard::ui::{describe_failure, manual_cleanup_instructions};

fn created(container: &str, id: &str) -> TaskEvent {
    TaskEvent::ContainerCreated {
        container: container.to_string(),
        docker_container: DockerContainer::new(id, format!("shop-{container}")),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn describes_common_failures() {
    assert_eq!(
        describe_failure(&TaskFailure::ImagePullFailed {
            image_name: "postgres:16".to_string(),
            message: "manifest unknown".to_string(),
        }),
        "Could not pull image 'postgres:16': manifest unknown"
    );
    assert_eq!(
        describe_failure(&TaskFailure::ImageBuildFailed {
            source: BuildImageSource::new("/project/app"),
            message: "syntax error".to_string(),
        }),
        "Could not build image from directory '/project/app': syntax error"
    );
    assert_eq!(
        describe_failure(&TaskFailure::TemporaryFileDeletionFailed {
            path: PathBuf::from("/tmp/x"),
            message: "busy".to_string(),
        }),
        "Could not delete temporary file '/tmp/x': busy"
    );
    assert_eq!(
        describe_failure(&TaskFailure::UserInterruptedExecution),
        "The task was interrupted by the user."
    );
}

#[test]
fn setup_command_failure_mentions_output_when_present() {
    let command = Command::parse("migrate --all").unwrap();

    let with_output = describe_failure(&TaskFailure::SetupCommandFailed {
        container: "db".to_string(),
        command: command.clone(),
        exit_code: 2,
        output: "relation exists\n".to_string(),
    });
    let without_output = describe_failure(&TaskFailure::SetupCommandFailed {
        container: "db".to_string(),
        command,
        exit_code: 2,
        output: "  ".to_string(),
    });

    assert_eq!(
        with_output,
        "Setup command 'migrate --all' in container 'db' failed (command exited with code 2 and output:\nrelation exists)"
    );
    assert_eq!(
        without_output,
        "Setup command 'migrate --all' in container 'db' failed (command exited with code 2 and did not produce any output)"
    );
}

#[test]
fn no_instructions_when_not_required() {
    assert_eq!(manual_cleanup_instructions(&PostTaskManualCleanup::NotRequired, &[]), None);
}

#[test]
fn cleanup_disabled_after_failure_explains_how_to_investigate() {
    let manual_cleanup = PostTaskManualCleanup::DueToTaskFailureWithCleanupDisabled {
        commands: strings(&["docker rm --force --volumes db-id", "docker network rm net-1"]),
    };
    let events = [created("db", "db-id")];

    let text = manual_cleanup_instructions(&manual_cleanup, &events).unwrap();

    assert_eq!(
        text,
        "As the task was run with --no-cleanup-after-failure or --no-cleanup, the created containers will not be cleaned up.\n\
         For container 'db', view its output by running 'docker logs db-id', or run a command in the container with 'docker exec -it db-id <command>'.\n\
         \n\
         Once you have finished investigating the issue, clean up all temporary resources created by dockyard by running:\n\
         docker rm --force --volumes db-id\n\
         docker network rm net-1"
    );
}

#[test]
fn cleanup_disabled_after_success_names_the_success_flag() {
    let manual_cleanup = PostTaskManualCleanup::DueToTaskSuccessWithCleanupDisabled {
        commands: strings(&["docker rm --force --volumes app-id"]),
    };
    let events = [created("app", "app-id"), created("db", "db-id")];

    let text = manual_cleanup_instructions(&manual_cleanup, &events).unwrap();

    assert!(text.starts_with("As the task was run with --no-cleanup-after-success or --no-cleanup"));
    assert!(text.contains("'docker logs app-id'"));
    assert!(text.contains("'docker logs db-id'"));
    assert!(text.contains("Once you have finished using the containers, clean up"));
}

#[test]
fn cleanup_failure_uses_singular_for_one_command() {
    let manual_cleanup = PostTaskManualCleanup::DueToCleanupFailure {
        commands: strings(&["docker network rm net-1"]),
    };

    assert_eq!(
        manual_cleanup_instructions(&manual_cleanup, &[]).unwrap(),
        "Clean up has failed, and dockyard cannot guarantee that all temporary resources created have been completely cleaned up.\n\
         You may need to run the following command to clean up any remaining resources:\n\
         docker network rm net-1"
    );
}

#[test]
fn cleanup_failure_lists_several_commands() {
    let manual_cleanup = PostTaskManualCleanup::DueToCleanupFailure {
        commands: strings(&["rm /tmp/app-passwd", "docker network rm net-1"]),
    };

    let text = manual_cleanup_instructions(&manual_cleanup, &[]).unwrap();

    assert!(text.ends_with(
        "You may need to run some or all of the following commands to clean up any remaining resources:\n\
         rm /tmp/app-passwd\n\
         docker network rm net-1"
    ));
}

#[test]
fn cleanup_failure_without_commands_only_warns() {
    let manual_cleanup = PostTaskManualCleanup::DueToCleanupFailure { commands: vec![] };

    assert_eq!(
        manual_cleanup_instructions(&manual_cleanup, &[]).unwrap(),
        "Clean up has failed, and dockyard cannot guarantee that all temporary resources created have been completely cleaned up."
    );
}
