// tests/stages.rs

mod common;
use crate::common::{ConfigFileBuilder, ContainerBuilder, TaskBuilder, app_with_db_and_cache, graph_for};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use dockyard::config::model::{BuildImageSource, ImageSource};
use dockyard::model::events::{EventLog, TaskEvent};
use dockyard::model::resources::{DockerContainer, DockerImage, DockerNetwork};
use dockyard::model::rules::{TaskStepRule, TaskStepRuleEvaluationResult};
use dockyard::model::stages::{CleanupStagePlanner, NextStepResult, RunStage, RunStagePlanner};
use dockyard::model::steps::TaskStep;
use dockyard::types::RunOptions;

fn log(events: Vec<TaskEvent>) -> EventLog {
    let mut log = EventLog::new();
    for event in events {
        log.add(event);
    }
    log
}

fn created(container: &str) -> TaskEvent {
    TaskEvent::ContainerCreated {
        container: container.to_string(),
        docker_container: DockerContainer::new(format!("{container}-id"), format!("shop-{container}")),
    }
}

fn started(container: &str) -> TaskEvent {
    TaskEvent::ContainerStarted {
        container: container.to_string(),
    }
}

fn ready(container: &str) -> TaskEvent {
    TaskEvent::ContainerBecameReady {
        container: container.to_string(),
    }
}

fn stopped(container: &str) -> TaskEvent {
    TaskEvent::ContainerStopped {
        container: container.to_string(),
    }
}

fn removed(container: &str) -> TaskEvent {
    TaskEvent::ContainerRemoved {
        container: container.to_string(),
    }
}

fn network_created() -> TaskEvent {
    TaskEvent::TaskNetworkCreated {
        network: DockerNetwork::new("net-1"),
    }
}

fn pop_step(stage: &mut RunStage, events: &EventLog) -> String {
    match stage.pop_next_step(events, false) {
        NextStepResult::StepReady(step) => step.to_string(),
        other => panic!("expected a ready step, got {other:?}"),
    }
}

fn run_stage_for_test_task(run_options: &RunOptions) -> RunStage {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");
    RunStagePlanner::new("shop").create_stage(&graph, run_options)
}

#[test]
fn run_stage_starts_with_network_and_images() {
    let mut stage = run_stage_for_test_task(&RunOptions::new("test"));
    let events = EventLog::new();

    assert_eq!(pop_step(&mut stage, &events), "PrepareTaskNetwork");
    assert_eq!(pop_step(&mut stage, &events), "BuildImage(/project/app)");
    assert_eq!(pop_step(&mut stage, &events), "PullImage(postgres:16)");
    assert_eq!(pop_step(&mut stage, &events), "PullImage(redis:7)");
    assert_eq!(stage.pop_next_step(&events, true), NextStepResult::NoStepsReady);
}

#[test]
fn run_stage_plans_every_container_step() {
    let stage = run_stage_for_test_task(&RunOptions::new("test"));
    let rules = stage.remaining_rules();

    // network + 1 build + 2 pulls + 4 per dependency + 2 for the task container
    assert_eq!(rules.len(), 14);

    let run_rules: Vec<_> = rules
        .iter()
        .filter(|r| matches!(r, TaskStepRule::RunContainer { .. }))
        .collect();
    assert_eq!(run_rules.len(), 1);
    assert!(matches!(
        run_rules[0],
        TaskStepRule::RunContainer { container, dependencies }
            if container == "app" && dependencies.contains("db")
    ));

    let setup_rules = rules
        .iter()
        .filter(|r| matches!(r, TaskStepRule::RunSetupCommands { .. }))
        .count();
    assert_eq!(setup_rules, 2);
}

#[test]
fn built_images_are_tagged_with_project_and_extra_tags() {
    let run_options = RunOptions {
        image_tags: BTreeMap::from([(
            "app".to_string(),
            BTreeSet::from(["registry.local/app:ci".to_string()]),
        )]),
        ..RunOptions::new("test")
    };
    let stage = run_stage_for_test_task(&run_options);

    let tags = stage
        .remaining_rules()
        .iter()
        .find_map(|r| match r {
            TaskStepRule::BuildImage { image_tags, .. } => Some(image_tags.clone()),
            _ => None,
        })
        .expect("build rule planned");

    assert_eq!(
        tags,
        BTreeSet::from(["registry.local/app:ci".to_string(), "shop-app".to_string()])
    );
}

#[test]
fn image_override_replaces_build_with_pull() {
    let run_options = RunOptions {
        image_overrides: BTreeMap::from([("app".to_string(), "shop/app:release".to_string())]),
        ..RunOptions::new("test")
    };
    let stage = run_stage_for_test_task(&run_options);
    let rules = stage.remaining_rules();

    assert!(!rules.iter().any(|r| matches!(r, TaskStepRule::BuildImage { .. })));
    assert!(rules.contains(&TaskStepRule::PullImage {
        image_name: "shop/app:release".to_string()
    }));
    assert!(rules.iter().any(|r| matches!(
        r,
        TaskStepRule::CreateContainer { container, image_source: ImageSource::Pull { image_name }, .. }
            if container.name == "app" && image_name == "shop/app:release"
    )));
}

#[test]
fn containers_sharing_an_image_pull_it_once() {
    let config = ConfigFileBuilder::new()
        .with_container(ContainerBuilder::new("app").image("alpine:3").depends_on("helper").build())
        .with_container(ContainerBuilder::new("helper").image("alpine:3").build())
        .with_task(TaskBuilder::new("test", "app").build())
        .build();
    let graph = graph_for(&config, "test");

    let stage = RunStagePlanner::new("shop").create_stage(&graph, &RunOptions::new("test"));
    let pulls = stage
        .remaining_rules()
        .iter()
        .filter(|r| matches!(r, TaskStepRule::PullImage { .. }))
        .count();

    assert_eq!(pulls, 1);
}

#[test]
fn create_container_waits_for_network_and_image() {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");
    let node = graph.node_for("cache").unwrap();

    let rule = TaskStepRule::CreateContainer {
        container: node.container.clone(),
        config: node.config.clone(),
        is_task_container: false,
        image_source: node.container.image_source.clone(),
        all_containers_in_network: graph.container_names(),
    };

    assert_eq!(rule.evaluate(&log(vec![network_created()])), TaskStepRuleEvaluationResult::NotReady);

    let events = log(vec![
        network_created(),
        TaskEvent::ImagePulled {
            image_name: "redis:7".to_string(),
            image: DockerImage::new("sha-redis"),
        },
    ]);

    match rule.evaluate(&events) {
        TaskStepRuleEvaluationResult::Ready(TaskStep::CreateContainer { image, network, all_containers_in_network, .. }) => {
            assert_eq!(image, DockerImage::new("sha-redis"));
            assert_eq!(network, DockerNetwork::new("net-1"));
            assert_eq!(all_containers_in_network.len(), 3);
        }
        other => panic!("expected create step, got {other:?}"),
    }
}

#[test]
fn start_waits_for_creation_and_ready_dependencies() {
    let rule = TaskStepRule::StartContainer {
        container: "db".to_string(),
        dependencies: BTreeSet::from(["cache".to_string()]),
    };

    assert_eq!(rule.evaluate(&EventLog::new()), TaskStepRuleEvaluationResult::NotReady);
    assert_eq!(
        rule.evaluate(&log(vec![created("db"), started("cache")])),
        TaskStepRuleEvaluationResult::NotReady
    );
    assert_eq!(
        rule.evaluate(&log(vec![created("db"), ready("cache")])),
        TaskStepRuleEvaluationResult::Ready(TaskStep::StartContainer {
            container: "db".to_string(),
            docker_container: DockerContainer::new("db-id", "shop-db"),
        })
    );
}

#[test]
fn health_check_and_setup_commands_follow_start_and_health() {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");
    let db = graph.node_for("db").unwrap();

    let wait = TaskStepRule::WaitForContainerToBecomeHealthy {
        container: "db".to_string(),
    };
    let setup = TaskStepRule::RunSetupCommands {
        container: db.container.clone(),
        config: db.config.clone(),
    };

    let created_only = log(vec![created("db")]);
    assert_eq!(wait.evaluate(&created_only), TaskStepRuleEvaluationResult::NotReady);

    let running = log(vec![created("db"), started("db")]);
    assert!(matches!(wait.evaluate(&running), TaskStepRuleEvaluationResult::Ready(_)));
    assert_eq!(setup.evaluate(&running), TaskStepRuleEvaluationResult::NotReady);

    let healthy = log(vec![
        created("db"),
        started("db"),
        TaskEvent::ContainerBecameHealthy {
            container: "db".to_string(),
        },
    ]);
    assert!(matches!(
        setup.evaluate(&healthy),
        TaskStepRuleEvaluationResult::Ready(TaskStep::RunSetupCommands { .. })
    ));
}

#[test]
fn run_stage_stops_emitting_once_the_task_container_exits() {
    let mut stage = run_stage_for_test_task(&RunOptions::new("test"));
    let events = log(vec![TaskEvent::RunningContainerExited {
        container: "app".to_string(),
        exit_code: 0,
    }]);

    assert_eq!(stage.pop_next_step(&events, true), NextStepResult::NoStepsReady);
    assert!(stage.remaining_rules().is_empty());
    assert_eq!(stage.pop_next_step(&events, false), NextStepResult::NoStepsRemaining);
}

fn everything_started() -> EventLog {
    log(vec![
        network_created(),
        created("cache"),
        created("db"),
        created("app"),
        started("cache"),
        started("db"),
        started("app"),
        TaskEvent::TemporaryFileCreated {
            container: "app".to_string(),
            path: PathBuf::from("/tmp/app-passwd"),
        },
        TaskEvent::TemporaryDirectoryCreated {
            container: "app".to_string(),
            path: PathBuf::from("/tmp/app-home"),
        },
    ])
}

#[test]
fn cleanup_lists_manual_commands_containers_then_paths_then_network() {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");

    let stage = CleanupStagePlanner::new().create_stage(&graph, &everything_started());

    assert_eq!(
        stage.manual_cleanup_commands(),
        [
            "docker rm --force --volumes cache-id",
            "docker rm --force --volumes db-id",
            "docker rm --force --volumes app-id",
            "rm /tmp/app-passwd",
            "rm -rf /tmp/app-home",
            "docker network rm net-1",
        ]
    );
}

#[test]
fn cleanup_stops_dependents_before_their_dependencies() {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");
    let mut stage = CleanupStagePlanner::new().create_stage(&graph, &everything_started());

    let mut events = everything_started();
    let mut order = Vec::new();

    loop {
        match stage.pop_next_step(&events) {
            NextStepResult::StepReady(step) => {
                order.push(step.to_string());
                let event = match &step {
                    TaskStep::StopContainer { container, .. } => stopped(container),
                    TaskStep::RemoveContainer { container, .. } => removed(container),
                    TaskStep::DeleteTemporaryFile { path } => TaskEvent::TemporaryFileDeleted { path: path.clone() },
                    TaskStep::DeleteTemporaryDirectory { path } => {
                        TaskEvent::TemporaryDirectoryDeleted { path: path.clone() }
                    }
                    TaskStep::DeleteTaskNetwork { .. } => TaskEvent::TaskNetworkDeleted,
                    other => panic!("unexpected cleanup step {other}"),
                };
                events.add(event);
            }
            NextStepResult::NoStepsRemaining => break,
            NextStepResult::NoStepsReady => panic!("cleanup stalled after {order:?}"),
        }
    }

    let position = |name: &str| order.iter().position(|s| s == name).unwrap();

    assert!(position("StopContainer(app)") < position("StopContainer(db)"));
    assert!(position("StopContainer(db)") < position("StopContainer(cache)"));
    assert!(position("StopContainer(cache)") < position("RemoveContainer(cache)"));
    assert!(position("RemoveContainer(app)") < position("DeleteTemporaryFile(/tmp/app-passwd)"));
    assert!(position("RemoveContainer(app)") < position("DeleteTemporaryDirectory(/tmp/app-home)"));
    assert_eq!(order.last().map(String::as_str), Some("DeleteTaskNetwork(net-1)"));
    assert_eq!(order.len(), 9);
}

#[test]
fn containers_that_never_started_are_only_removed() {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");
    let events = log(vec![network_created(), created("cache")]);

    let mut stage = CleanupStagePlanner::new().create_stage(&graph, &events);

    assert_eq!(
        stage.pop_next_step(&events),
        NextStepResult::StepReady(TaskStep::RemoveContainer {
            container: "cache".to_string(),
            docker_container: DockerContainer::new("cache-id", "shop-cache"),
        })
    );
    assert_eq!(stage.pop_next_step(&events), NextStepResult::NoStepsReady);
}

#[test]
fn nothing_created_means_nothing_to_clean_up() {
    let config = app_with_db_and_cache();
    let graph = graph_for(&config, "test");

    let mut stage = CleanupStagePlanner::new().create_stage(&graph, &EventLog::new());

    assert!(stage.manual_cleanup_commands().is_empty());
    assert_eq!(stage.pop_next_step(&EventLog::new()), NextStepResult::NoStepsRemaining);
}

#[test]
fn event_log_ignores_duplicates() {
    let mut events = EventLog::new();

    assert!(events.add(started("db")));
    assert!(!events.add(started("db")));
    assert_eq!(events.len(), 1);
    assert!(events.container_started("db"));
    assert!(!events.has_failure());

    events.add(TaskEvent::execution_failed("boom"));
    assert!(events.has_failure());
}

#[test]
fn build_rule_is_ready_immediately() {
    let source = BuildImageSource::new("/project/app");
    let rule = TaskStepRule::BuildImage {
        source: source.clone(),
        image_tags: BTreeSet::from(["shop-app".to_string()]),
    };

    assert!(matches!(
        rule.evaluate(&EventLog::new()),
        TaskStepRuleEvaluationResult::Ready(TaskStep::BuildImage { source: s, .. }) if s == source
    ));
}
