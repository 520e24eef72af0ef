// src/model/stages/cleanup.rs

use std::collections::BTreeSet;

use tracing::debug;

use crate::dag::graph::ContainerDependencyGraph;
use crate::model::events::EventLog;
use crate::model::rules::TaskStepRule;
use crate::model::stages::CleanupStage;

/// Plans the cleanup stage from whatever the run stage managed to create.
#[derive(Debug, Clone, Default)]
pub struct CleanupStagePlanner;

impl CleanupStagePlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn create_stage(&self, graph: &ContainerDependencyGraph, events: &EventLog) -> CleanupStage {
        let mut rules = Vec::new();

        let created: Vec<_> = events
            .created_containers()
            .into_iter()
            .filter(|(name, _)| graph.node_for(name).is_some())
            .collect();

        let started: BTreeSet<String> = created
            .iter()
            .filter(|(name, _)| events.container_started(name))
            .map(|(name, _)| name.to_string())
            .collect();

        for (name, docker_container) in &created {
            let was_started = started.contains(*name);

            if was_started {
                let containers_that_must_be_stopped_first = graph
                    .dependents_of(name)
                    .into_iter()
                    .filter(|dependent| started.contains(dependent))
                    .collect();

                rules.push(TaskStepRule::StopContainer {
                    container: name.to_string(),
                    docker_container: (*docker_container).clone(),
                    containers_that_must_be_stopped_first,
                });
            }

            rules.push(TaskStepRule::RemoveContainer {
                container: name.to_string(),
                docker_container: (*docker_container).clone(),
                container_was_started: was_started,
            });
        }

        let created_names: BTreeSet<String> =
            created.iter().map(|(name, _)| name.to_string()).collect();
        let owner_if_created = |container: &str| {
            created_names
                .contains(container)
                .then(|| container.to_string())
        };

        for (container, path) in events.temporary_files() {
            rules.push(TaskStepRule::DeleteTemporaryFile {
                path: path.to_path_buf(),
                container_that_must_be_removed_first: owner_if_created(container),
            });
        }

        for (container, path) in events.temporary_directories() {
            rules.push(TaskStepRule::DeleteTemporaryDirectory {
                path: path.to_path_buf(),
                container_that_must_be_removed_first: owner_if_created(container),
            });
        }

        if let Some(network) = events.network() {
            rules.push(TaskStepRule::DeleteTaskNetwork {
                network: network.clone(),
                containers_that_must_be_removed_first: created_names.clone(),
            });
        }

        debug!(
            task = %graph.task_name(),
            created = created_names.len(),
            started = started.len(),
            rules = rules.len(),
            "planned cleanup stage"
        );

        CleanupStage::new(rules)
    }
}
