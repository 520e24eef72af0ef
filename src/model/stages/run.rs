// src/model/stages/run.rs

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::model::{BuildImageSource, ImageSource};
use crate::dag::graph::ContainerDependencyGraph;
use crate::model::rules::TaskStepRule;
use crate::model::stages::RunStage;
use crate::types::RunOptions;

/// Plans the run stage for a container graph.
#[derive(Debug, Clone)]
pub struct RunStagePlanner {
    project_name: String,
}

impl RunStagePlanner {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
        }
    }

    pub fn create_stage(&self, graph: &ContainerDependencyGraph, run_options: &RunOptions) -> RunStage {
        let mut rules = vec![TaskStepRule::CreateTaskNetwork];

        let mut pulls = BTreeSet::new();
        let mut builds: BTreeMap<BuildImageSource, BTreeSet<String>> = BTreeMap::new();
        let mut image_sources = BTreeMap::new();

        for node in graph.all_nodes() {
            let name = node.name();
            let source = match run_options.image_overrides.get(name) {
                Some(image_name) => ImageSource::Pull {
                    image_name: image_name.clone(),
                },
                None => node.container.image_source.clone(),
            };

            match &source {
                ImageSource::Pull { image_name } => {
                    pulls.insert(image_name.clone());
                }
                ImageSource::Build(build) => {
                    let tags = builds.entry(build.clone()).or_default();
                    tags.insert(format!("{}-{}", self.project_name, name));
                    if let Some(extra) = run_options.image_tags.get(name) {
                        tags.extend(extra.iter().cloned());
                    }
                }
            }

            image_sources.insert(name.to_string(), source);
        }

        rules.extend(
            builds
                .into_iter()
                .map(|(source, image_tags)| TaskStepRule::BuildImage { source, image_tags }),
        );
        rules.extend(
            pulls
                .into_iter()
                .map(|image_name| TaskStepRule::PullImage { image_name }),
        );

        let all_containers_in_network = graph.container_names();

        for node in graph.startup_order() {
            let Some(image_source) = image_sources.remove(node.name()) else {
                continue;
            };

            rules.push(TaskStepRule::CreateContainer {
                container: node.container.clone(),
                config: node.config.clone(),
                is_task_container: node.is_root_node,
                image_source,
                all_containers_in_network: all_containers_in_network.clone(),
            });

            if node.is_root_node {
                rules.push(TaskStepRule::RunContainer {
                    container: node.container.name.clone(),
                    dependencies: node.depends_on.clone(),
                });
            } else {
                rules.push(TaskStepRule::StartContainer {
                    container: node.container.name.clone(),
                    dependencies: node.depends_on.clone(),
                });
                rules.push(TaskStepRule::WaitForContainerToBecomeHealthy {
                    container: node.container.name.clone(),
                });
                rules.push(TaskStepRule::RunSetupCommands {
                    container: node.container.clone(),
                    config: node.config.clone(),
                });
            }
        }

        debug!(
            task = %graph.task_name(),
            rules = rules.len(),
            "planned run stage"
        );

        RunStage::new(rules, graph.task_container_name())
    }
}
