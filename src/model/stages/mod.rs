// src/model/stages/mod.rs

//! The two scheduling phases of a task run.
//!
//! A stage owns the rules it has not yet emitted. Each call to
//! `pop_next_step` hands out at most one step and forgets its rule, so a
//! step is never produced twice.

pub mod cleanup;
pub mod run;

use tracing::trace;

use crate::config::model::ContainerName;
use crate::model::events::EventLog;
use crate::model::rules::{TaskStepRule, TaskStepRuleEvaluationResult};
use crate::model::steps::TaskStep;

pub use cleanup::CleanupStagePlanner;
pub use run::RunStagePlanner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStepResult {
    StepReady(TaskStep),
    /// Rules remain but none is satisfied by the events so far.
    NoStepsReady,
    /// Nothing left to emit in this stage.
    NoStepsRemaining,
}

#[derive(Debug, Clone)]
pub enum Stage {
    Run(RunStage),
    Cleanup(CleanupStage),
}

impl Stage {
    pub fn pop_next_step(&mut self, events: &EventLog, steps_still_running: bool) -> NextStepResult {
        match self {
            Stage::Run(stage) => stage.pop_next_step(events, steps_still_running),
            Stage::Cleanup(stage) => stage.pop_next_step(events),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Run(_) => "run",
            Stage::Cleanup(_) => "cleanup",
        }
    }
}

/// Builds images, creates and starts containers, and runs the task
/// container until it exits.
#[derive(Debug, Clone)]
pub struct RunStage {
    rules: Vec<TaskStepRule>,
    task_container: ContainerName,
}

impl RunStage {
    pub fn new(rules: Vec<TaskStepRule>, task_container: impl Into<ContainerName>) -> Self {
        Self {
            rules,
            task_container: task_container.into(),
        }
    }

    pub fn pop_next_step(&mut self, events: &EventLog, steps_still_running: bool) -> NextStepResult {
        // Once the task container has exited there is nothing left worth
        // starting; finish as soon as in-flight work drains.
        if events.exit_code_of(&self.task_container).is_some() {
            if !self.rules.is_empty() {
                trace!(remaining = self.rules.len(), "task container exited, dropping remaining run rules");
                self.rules.clear();
            }

            return if steps_still_running {
                NextStepResult::NoStepsReady
            } else {
                NextStepResult::NoStepsRemaining
            };
        }

        pop_first_ready(&mut self.rules, events)
    }

    pub fn remaining_rules(&self) -> &[TaskStepRule] {
        &self.rules
    }
}

/// Stops and removes what the run stage created.
#[derive(Debug, Clone)]
pub struct CleanupStage {
    rules: Vec<TaskStepRule>,
    manual_cleanup_commands: Vec<String>,
}

impl CleanupStage {
    /// Manual cleanup commands are derived from `rules` up front, ordered
    /// containers first, then temporary paths, then the network.
    pub fn new(rules: Vec<TaskStepRule>) -> Self {
        let mut ordered: Vec<&TaskStepRule> = rules.iter().collect();
        ordered.sort_by_key(|rule| rule.manual_cleanup_sort_order());

        let manual_cleanup_commands = ordered
            .into_iter()
            .filter_map(TaskStepRule::manual_cleanup_command)
            .collect();

        Self {
            rules,
            manual_cleanup_commands,
        }
    }

    pub fn pop_next_step(&mut self, events: &EventLog) -> NextStepResult {
        pop_first_ready(&mut self.rules, events)
    }

    pub fn manual_cleanup_commands(&self) -> &[String] {
        &self.manual_cleanup_commands
    }

    pub fn remaining_rules(&self) -> &[TaskStepRule] {
        &self.rules
    }
}

fn pop_first_ready(rules: &mut Vec<TaskStepRule>, events: &EventLog) -> NextStepResult {
    for index in 0..rules.len() {
        if let TaskStepRuleEvaluationResult::Ready(step) = rules[index].evaluate(events) {
            rules.remove(index);
            return NextStepResult::StepReady(step);
        }
    }

    if rules.is_empty() {
        NextStepResult::NoStepsRemaining
    } else {
        NextStepResult::NoStepsReady
    }
}
