// src/ui/messages.rs

//! Human-readable text for failures and manual cleanup instructions.

use crate::engine::state_machine::PostTaskManualCleanup;
use crate::model::events::{TaskEvent, TaskFailure};

pub fn describe_failure(failure: &TaskFailure) -> String {
    match failure {
        TaskFailure::ExecutionFailed { message } => {
            format!("An unexpected exception occurred during execution: {message}")
        }
        TaskFailure::TaskNetworkCreationFailed { message } => {
            format!("Could not create network for task: {message}")
        }
        TaskFailure::ImageBuildFailed { source, message } => format!(
            "Could not build image from directory '{}': {message}",
            source.build_directory.display()
        ),
        TaskFailure::ImagePullFailed {
            image_name,
            message,
        } => format!("Could not pull image '{image_name}': {message}"),
        TaskFailure::ContainerCreationFailed { container, message } => {
            format!("Could not create container '{container}': {message}")
        }
        TaskFailure::ContainerStartFailed { container, message } => {
            format!("Could not start container '{container}': {message}")
        }
        TaskFailure::ContainerDidNotBecomeHealthy { container, message } => {
            format!("Container '{container}' did not become healthy: {message}")
        }
        TaskFailure::ContainerRunFailed { container, message } => {
            format!("Could not run container '{container}': {message}")
        }
        TaskFailure::SetupCommandExecutionError {
            container,
            command,
            message,
        } => format!("Could not run setup command '{command}' in container '{container}': {message}"),
        TaskFailure::SetupCommandFailed {
            container,
            command,
            exit_code,
            output,
        } => {
            if output.trim().is_empty() {
                format!("Setup command '{command}' in container '{container}' failed (command exited with code {exit_code} and did not produce any output)")
            } else {
                format!("Setup command '{command}' in container '{container}' failed (command exited with code {exit_code} and output:\n{})", output.trim_end())
            }
        }
        TaskFailure::ContainerStopFailed { container, message } => {
            format!("Could not stop container '{container}': {message}")
        }
        TaskFailure::ContainerRemovalFailed { container, message } => {
            format!("Could not remove container '{container}': {message}")
        }
        TaskFailure::TaskNetworkDeletionFailed { message } => {
            format!("Could not delete the task network: {message}")
        }
        TaskFailure::TemporaryFileDeletionFailed { path, message } => {
            format!("Could not delete temporary file '{}': {message}", path.display())
        }
        TaskFailure::TemporaryDirectoryDeletionFailed { path, message } => {
            format!("Could not delete temporary directory '{}': {message}", path.display())
        }
        TaskFailure::UserInterruptedExecution => "The task was interrupted by the user.".to_string(),
    }
}

/// Instructions to print after a run, or `None` if nothing is needed.
pub fn manual_cleanup_instructions(
    manual_cleanup: &PostTaskManualCleanup,
    events: &[TaskEvent],
) -> Option<String> {
    match manual_cleanup {
        PostTaskManualCleanup::NotRequired => None,
        PostTaskManualCleanup::DueToCleanupFailure { commands } => {
            Some(cleanup_failure_instructions(commands))
        }
        PostTaskManualCleanup::DueToTaskFailureWithCleanupDisabled { commands } => {
            Some(cleanup_disabled_instructions(
                "--no-cleanup-after-failure",
                "investigating the issue",
                commands,
                events,
            ))
        }
        PostTaskManualCleanup::DueToTaskSuccessWithCleanupDisabled { commands } => {
            Some(cleanup_disabled_instructions(
                "--no-cleanup-after-success",
                "using the containers",
                commands,
                events,
            ))
        }
    }
}

fn cleanup_disabled_instructions(
    flag: &str,
    activity: &str,
    commands: &[String],
    events: &[TaskEvent],
) -> String {
    let mut text = format!(
        "As the task was run with {flag} or --no-cleanup, the created containers will not be cleaned up.\n"
    );

    for event in events {
        if let TaskEvent::ContainerCreated {
            container,
            docker_container,
        } = event
        {
            let id = &docker_container.id;
            text.push_str(&format!(
                "For container '{container}', view its output by running 'docker logs {id}', or run a command in the container with 'docker exec -it {id} <command>'.\n"
            ));
        }
    }

    text.push_str(&format!(
        "\nOnce you have finished {activity}, clean up all temporary resources created by dockyard by running:\n"
    ));
    text.push_str(&commands.join("\n"));
    text
}

fn cleanup_failure_instructions(commands: &[String]) -> String {
    let mut text = "Clean up has failed, and dockyard cannot guarantee that all temporary resources created have been completely cleaned up.".to_string();

    match commands.len() {
        0 => {}
        1 => {
            text.push_str("\nYou may need to run the following command to clean up any remaining resources:\n");
            text.push_str(&commands[0]);
        }
        _ => {
            text.push_str("\nYou may need to run some or all of the following commands to clean up any remaining resources:\n");
            text.push_str(&commands.join("\n"));
        }
    }

    text
}
