// src/dag/task_order.rs

//! Expands a requested task into the ordered list of tasks to run.
//!
//! Prerequisites are expanded depth-first, in declaration order. A task that
//! is already scheduled is not expanded again, so every task appears once
//! and always after all of its prerequisites.

use regex::Regex;
use tracing::debug;

use crate::config::model::{ConfigFile, Task};
use crate::dag::suggestions::{format_suggestions, suggest_corrections};
use crate::errors::TaskOrderError;

pub struct TaskExecutionOrderResolver<'a> {
    config: &'a ConfigFile,
}

impl<'a> TaskExecutionOrderResolver<'a> {
    pub fn new(config: &'a ConfigFile) -> Self {
        Self { config }
    }

    /// Tasks to run for `task_name`, prerequisites first, ending with the
    /// requested task itself.
    pub fn resolve_execution_order(
        &self,
        task_name: &str,
        skip_prerequisites: bool,
    ) -> Result<Vec<&'a Task>, TaskOrderError> {
        let task = self
            .config
            .task(task_name)
            .ok_or_else(|| TaskOrderError::TaskDoesNotExist {
                task: task_name.to_string(),
                suggestions: self.suggestions_for(task_name),
            })?;

        if skip_prerequisites {
            debug!(task = %task_name, "skipping prerequisites");
            return Ok(vec![task]);
        }

        let mut order = Vec::new();
        self.visit(task, &[], &mut order)?;

        debug!(
            task = %task_name,
            order = ?order.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "resolved task execution order"
        );

        Ok(order)
    }

    fn visit(
        &self,
        task: &'a Task,
        path: &[&'a str],
        order: &mut Vec<&'a Task>,
    ) -> Result<(), TaskOrderError> {
        let mut path_for_prerequisites = path.to_vec();
        path_for_prerequisites.push(&task.name);

        let prerequisites = self.prerequisites_of(task)?;

        for &prerequisite in &prerequisites {
            if path_for_prerequisites.contains(&prerequisite.name.as_str()) {
                let mut cycle = path_for_prerequisites.clone();
                cycle.push(&prerequisite.name);
                return Err(cycle_error(&cycle));
            }
        }

        for prerequisite in prerequisites {
            if !order.iter().any(|t| t.name == prerequisite.name) {
                self.visit(prerequisite, &path_for_prerequisites, order)?;
            }
        }

        order.push(task);
        Ok(())
    }

    fn prerequisites_of(&self, task: &'a Task) -> Result<Vec<&'a Task>, TaskOrderError> {
        let mut resolved = Vec::new();

        for name in &task.prerequisites {
            if name.contains('*') {
                resolved.extend(self.tasks_matching_wildcard(name)?);
                continue;
            }

            let prerequisite = self.config.task(name).ok_or_else(|| {
                TaskOrderError::PrerequisiteDoesNotExist {
                    prerequisite: name.clone(),
                    task: task.name.clone(),
                    suggestions: self.suggestions_for(name),
                }
            })?;
            resolved.push(prerequisite);
        }

        Ok(resolved)
    }

    /// Every task whose name matches `pattern`, sorted by name. Only `*` is
    /// special.
    fn tasks_matching_wildcard(&self, pattern: &str) -> Result<Vec<&'a Task>, TaskOrderError> {
        let expression = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let Ok(matcher) = Regex::new(&format!("^{expression}$")) else {
            return Ok(Vec::new());
        };

        // The task map is a BTreeMap, so iteration is already sorted.
        Ok(self
            .config
            .tasks
            .values()
            .filter(|t| matcher.is_match(&t.name))
            .collect())
    }

    fn suggestions_for(&self, name: &str) -> String {
        let candidates = suggest_corrections(self.config.tasks.keys().map(String::as_str), name);
        format_suggestions(&candidates)
    }
}

fn cycle_error(path: &[&str]) -> TaskOrderError {
    let mut description = format!("task '{}' has '{}' as a prerequisite", path[0], path[1]);
    for name in &path[2..] {
        description.push_str(&format!(", which has '{name}' as a prerequisite"));
    }

    TaskOrderError::DependencyCycle {
        description,
        path: path.iter().map(|s| s.to_string()).collect(),
    }
}
