// tests/property/main.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;

use dockyard::config::model::ConfigFile;
use dockyard::dag::{ContainerDependencyGraph, TaskExecutionOrderResolver};
use dockyard::types::RunOptions;
use dockyard_test_utils::builders::{ConfigFileBuilder, ContainerBuilder, TaskBuilder};

// Acyclic by construction: item N may only depend on items 0..N-1.
fn sanitize(index: usize, raw: Vec<usize>) -> BTreeSet<usize> {
    if index == 0 {
        return BTreeSet::new();
    }
    raw.into_iter().map(|r| r % index).collect()
}

fn raw_dependencies(max: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max).prop_flat_map(|count| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..count), count)
    })
}

/// Prerequisite-only tasks `task_0..task_N`.
fn task_config(raw: Vec<Vec<usize>>) -> (ConfigFile, Vec<BTreeSet<usize>>) {
    let mut builder = ConfigFileBuilder::new();
    let mut edges = Vec::new();

    for (i, potential) in raw.into_iter().enumerate() {
        let deps = sanitize(i, potential);
        let mut task = TaskBuilder::prerequisites_only(&format!("task_{i}"));
        for dep in &deps {
            task = task.prerequisite(&format!("task_{dep}"));
        }
        builder = builder.with_task(task.build());
        edges.push(deps);
    }

    (builder.build(), edges)
}

/// Containers `c0..cN`, with the task running in the last one.
fn container_config(raw: Vec<Vec<usize>>) -> (ConfigFile, Vec<BTreeSet<usize>>) {
    let mut builder = ConfigFileBuilder::new();
    let mut edges = Vec::new();
    let count = raw.len();

    for (i, potential) in raw.into_iter().enumerate() {
        let deps = sanitize(i, potential);
        let mut container = ContainerBuilder::new(&format!("c{i}"));
        for dep in &deps {
            container = container.depends_on(&format!("c{dep}"));
        }
        builder = builder.with_container(container.build());
        edges.push(deps);
    }

    let task = TaskBuilder::new("run", &format!("c{}", count - 1)).build();
    (builder.with_task(task).build(), edges)
}

fn reachable_from(start: usize, edges: &[BTreeSet<usize>]) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(next) = stack.pop() {
        if seen.insert(next) {
            stack.extend(edges[next].iter().copied());
        }
    }
    seen
}

proptest! {
    #[test]
    fn execution_order_runs_prerequisites_first(raw in raw_dependencies(12)) {
        let (config, edges) = task_config(raw);
        let main = edges.len() - 1;
        let main_name = format!("task_{main}");

        let order = TaskExecutionOrderResolver::new(&config)
            .resolve_execution_order(&main_name, false)
            .unwrap();
        let names: Vec<&str> = order.iter().map(|t| t.name.as_str()).collect();

        // Each task once, the requested one last.
        let unique: HashSet<&str> = names.iter().copied().collect();
        prop_assert_eq!(unique.len(), names.len());
        prop_assert_eq!(names.last().copied(), Some(main_name.as_str()));

        // Exactly the transitive prerequisites.
        let expected: HashSet<String> = reachable_from(main, &edges)
            .into_iter()
            .map(|i| format!("task_{i}"))
            .collect();
        let actual: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
        prop_assert_eq!(actual, expected);

        for (position, name) in names.iter().enumerate() {
            let index: usize = name.trim_start_matches("task_").parse().unwrap();
            for dep in &edges[index] {
                let dep_position = names.iter().position(|n| *n == format!("task_{dep}")).unwrap();
                prop_assert!(dep_position < position, "{} ran before its prerequisite task_{}", name, dep);
            }
        }
    }

    #[test]
    fn startup_order_puts_dependencies_first(raw in raw_dependencies(10)) {
        let (config, edges) = container_config(raw);
        let root = edges.len() - 1;
        let root_name = format!("c{root}");
        let task = config.task("run").unwrap();

        let graph = ContainerDependencyGraph::new(&config, task, &RunOptions::new("run")).unwrap();
        let order: Vec<String> = graph.startup_order().iter().map(|n| n.name().to_string()).collect();

        let expected: BTreeSet<String> = reachable_from(root, &edges)
            .into_iter()
            .map(|i| format!("c{i}"))
            .collect();
        prop_assert_eq!(graph.container_names(), expected);
        prop_assert_eq!(order.last(), Some(&root_name));

        for (position, name) in order.iter().enumerate() {
            let index: usize = name.trim_start_matches('c').parse().unwrap();
            for dep in &edges[index] {
                let dep_position = order.iter().position(|n| *n == format!("c{dep}")).unwrap();
                prop_assert!(dep_position < position, "{} started before its dependency c{}", name, dep);
            }
        }
    }
}
