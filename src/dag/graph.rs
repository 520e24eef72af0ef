// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::config::model::{ConfigFile, Container, ContainerName, Task, TaskName};
use crate::dag::overrides::ContainerRuntimeConfiguration;
use crate::errors::GraphError;
use crate::types::RunOptions;

/// One container taking part in a task, with its settings resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDependencyGraphNode {
    pub container: Container,
    pub config: ContainerRuntimeConfiguration,
    /// True only for the container the task runs.
    pub is_root_node: bool,
    /// Direct dependencies, by container name.
    pub depends_on: BTreeSet<ContainerName>,
}

impl ContainerDependencyGraphNode {
    pub fn name(&self) -> &str {
        &self.container.name
    }
}

/// The containers a single task needs: its own container plus everything
/// it transitively depends on.
///
/// Built once per task run. Guarantees exactly one root node, no self
/// dependencies, no cycles, only known containers, and no customisations
/// for containers outside the graph.
#[derive(Debug, Clone)]
pub struct ContainerDependencyGraph {
    task_name: TaskName,
    root: ContainerName,
    nodes: BTreeMap<ContainerName, ContainerDependencyGraphNode>,
    /// Edges point from a dependency to the container that needs it.
    edges: DiGraph<ContainerName, ()>,
    indices: HashMap<ContainerName, NodeIndex>,
}

impl ContainerDependencyGraph {
    /// Build and validate the graph for `task`.
    pub fn new(config: &ConfigFile, task: &Task, run_options: &RunOptions) -> Result<Self, GraphError> {
        let run = task
            .run_configuration
            .as_ref()
            .ok_or_else(|| GraphError::TaskHasNoRunConfiguration {
                task: task.name.clone(),
            })?;

        if task.dependencies.contains(&run.container) {
            return Err(GraphError::MainContainerIsAlsoDependency {
                task: task.name.clone(),
                container: run.container.clone(),
            });
        }

        let mut builder = GraphBuilder {
            config,
            task,
            run_options,
            root_name: &run.container,
            nodes: BTreeMap::new(),
        };

        let task_reference = format!("task '{}'", task.name);
        let root = builder.find_container(&run.container, &task_reference)?;

        let mut root_dependencies = builder.find_containers(&task.dependencies, &task_reference)?;
        for dependency in builder.find_containers(&root.dependencies, &container_reference(root))? {
            if !root_dependencies.iter().any(|c| c.name == dependency.name) {
                root_dependencies.push(dependency);
            }
        }

        builder.get_or_create_node(root, &root_dependencies, true, &[])?;

        for customised in task.customisations.keys() {
            if !builder.nodes.contains_key(customised) {
                return Err(GraphError::CustomisationForUnusedContainer {
                    task: task.name.clone(),
                    container: customised.clone(),
                });
            }
        }

        let nodes = builder.nodes;
        let (edges, indices) = build_edges(&nodes);

        debug!(
            task = %task.name,
            root = %run.container,
            containers = nodes.len(),
            "built container dependency graph"
        );

        Ok(Self {
            task_name: task.name.clone(),
            root: run.container.clone(),
            nodes,
            edges,
            indices,
        })
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn task_container_node(&self) -> &ContainerDependencyGraphNode {
        // Construction always inserts the root.
        &self.nodes[&self.root]
    }

    pub fn task_container_name(&self) -> &str {
        &self.root
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &ContainerDependencyGraphNode> {
        self.nodes.values()
    }

    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.nodes.values().map(|n| &n.container)
    }

    pub fn container_names(&self) -> BTreeSet<ContainerName> {
        self.nodes.keys().cloned().collect()
    }

    pub fn node_for(&self, container: &str) -> Option<&ContainerDependencyGraphNode> {
        self.nodes.get(container)
    }

    /// Containers that directly depend on `container`.
    pub fn dependents_of(&self, container: &str) -> BTreeSet<ContainerName> {
        let Some(&index) = self.indices.get(container) else {
            return BTreeSet::new();
        };

        self.edges
            .neighbors_directed(index, Direction::Outgoing)
            .map(|n| self.edges[n].clone())
            .collect()
    }

    /// Nodes ordered so every container comes after its dependencies.
    pub fn startup_order(&self) -> Vec<&ContainerDependencyGraphNode> {
        match toposort(&self.edges, None) {
            Ok(order) => order
                .into_iter()
                .filter_map(|index| self.nodes.get(&self.edges[index]))
                .collect(),
            Err(_) => self.nodes.values().collect(),
        }
    }
}

struct GraphBuilder<'a> {
    config: &'a ConfigFile,
    task: &'a Task,
    run_options: &'a RunOptions,
    root_name: &'a str,
    nodes: BTreeMap<ContainerName, ContainerDependencyGraphNode>,
}

impl<'a> GraphBuilder<'a> {
    fn get_or_create_node(
        &mut self,
        container: &'a Container,
        dependencies: &[&'a Container],
        is_root_node: bool,
        path: &[&'a str],
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&container.name) {
            return Ok(());
        }

        if dependencies.iter().any(|d| d.name == container.name) {
            return Err(GraphError::SelfDependency {
                container: container.name.clone(),
            });
        }

        let mut path_for_dependencies = path.to_vec();
        path_for_dependencies.push(&container.name);

        for &dependency in dependencies {
            if path_for_dependencies.contains(&dependency.name.as_str()) {
                let mut cycle = path_for_dependencies.clone();
                cycle.push(&dependency.name);
                return Err(self.cycle_error(&cycle));
            }

            let nested =
                self.find_containers(&dependency.dependencies, &container_reference(dependency))?;
            self.get_or_create_node(dependency, &nested, false, &path_for_dependencies)?;
        }

        let config = ContainerRuntimeConfiguration::resolve(
            container,
            self.task,
            is_root_node,
            self.run_options,
        )?;

        self.nodes.insert(
            container.name.clone(),
            ContainerDependencyGraphNode {
                container: container.clone(),
                config,
                is_root_node,
                depends_on: dependencies.iter().map(|d| d.name.clone()).collect(),
            },
        );

        Ok(())
    }

    fn find_container(&self, name: &str, referenced_by: &str) -> Result<&'a Container, GraphError> {
        self.config
            .container(name)
            .ok_or_else(|| GraphError::ContainerDoesNotExist {
                container: name.to_string(),
                referenced_by: referenced_by.to_string(),
            })
    }

    fn find_containers(
        &self,
        names: &BTreeSet<ContainerName>,
        referenced_by: &str,
    ) -> Result<Vec<&'a Container>, GraphError> {
        names
            .iter()
            .map(|name| self.find_container(name, referenced_by))
            .collect()
    }

    fn cycle_error(&self, path: &[&str]) -> GraphError {
        GraphError::DependencyCycle {
            task: self.task.name.clone(),
            description: self.describe_cycle(path),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `path` starts at the root and ends with the repeated container.
    fn describe_cycle(&self, path: &[&str]) -> String {
        let introduced_by_task = path
            .get(1)
            .is_some_and(|first| self.task.dependencies.contains(*first));

        if introduced_by_task {
            let chain = &path[1..];
            let mut description = format!(
                "Container '{}' (which is explicitly started by the task) depends on {}",
                chain[0],
                self.describe_link(chain[1])
            );
            for pair in chain[1..].windows(2) {
                description.push_str(&format!(
                    ", and '{}' depends on {}",
                    pair[0],
                    self.describe_link(pair[1])
                ));
            }
            description.push('.');
            return description;
        }

        let mut description = format!("Container '{}' depends on '{}'", path[0], path[1]);
        for name in &path[2..] {
            description.push_str(&format!(", which depends on '{name}'"));
        }
        description.push('.');
        description
    }

    fn describe_link(&self, name: &str) -> String {
        if name == self.root_name {
            format!("the task container '{name}'")
        } else {
            format!("'{name}'")
        }
    }
}

fn container_reference(container: &Container) -> String {
    format!("container '{}'", container.name)
}

fn build_edges(
    nodes: &BTreeMap<ContainerName, ContainerDependencyGraphNode>,
) -> (DiGraph<ContainerName, ()>, HashMap<ContainerName, NodeIndex>) {
    let mut edges = DiGraph::new();
    let mut indices = HashMap::new();

    for name in nodes.keys() {
        indices.insert(name.clone(), edges.add_node(name.clone()));
    }

    for node in nodes.values() {
        let to = indices[&node.container.name];
        for dependency in &node.depends_on {
            if let Some(&from) = indices.get(dependency) {
                edges.add_edge(from, to, ());
            }
        }
    }

    (edges, indices)
}
