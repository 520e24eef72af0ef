use std::sync::Mutex;
use std::time::Duration;

use dockyard::engine::state_machine::PostTaskManualCleanup;
use dockyard::model::events::TaskEvent;
use dockyard::ui::EventLogger;

/// Everything an `EventLogger` was told, for assertions.
#[derive(Debug, Default)]
pub struct RecordingEventLogger {
    events: Mutex<Vec<TaskEvent>>,
    started: Mutex<Vec<String>>,
    prerequisites_only: Mutex<Vec<String>>,
    finished: Mutex<Vec<(String, i64)>>,
    finished_with_cleanup_disabled: Mutex<Vec<PostTaskManualCleanup>>,
    failed: Mutex<Vec<(String, PostTaskManualCleanup)>>,
    /// Names of the task-level callbacks, in the order they arrived.
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn started_tasks(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn prerequisite_only_tasks(&self) -> Vec<String> {
        self.prerequisites_only.lock().unwrap().clone()
    }

    pub fn finished_tasks(&self) -> Vec<(String, i64)> {
        self.finished.lock().unwrap().clone()
    }

    pub fn finished_with_cleanup_disabled(&self) -> Vec<PostTaskManualCleanup> {
        self.finished_with_cleanup_disabled.lock().unwrap().clone()
    }

    pub fn failed_tasks(&self) -> Vec<(String, PostTaskManualCleanup)> {
        self.failed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

impl EventLogger for RecordingEventLogger {
    fn post_event(&self, event: &TaskEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_task_starting(&self, task_name: &str) {
        self.record_call("on_task_starting");
        self.started.lock().unwrap().push(task_name.to_string());
    }

    fn on_task_only_has_prerequisites(&self, task_name: &str) {
        self.record_call("on_task_only_has_prerequisites");
        self.prerequisites_only
            .lock()
            .unwrap()
            .push(task_name.to_string());
    }

    fn on_task_finished(&self, task_name: &str, exit_code: i64, _duration: Duration) {
        self.record_call("on_task_finished");
        self.finished
            .lock()
            .unwrap()
            .push((task_name.to_string(), exit_code));
    }

    fn on_task_finished_with_cleanup_disabled(
        &self,
        manual_cleanup: &PostTaskManualCleanup,
        _events: &[TaskEvent],
    ) {
        self.record_call("on_task_finished_with_cleanup_disabled");
        self.finished_with_cleanup_disabled
            .lock()
            .unwrap()
            .push(manual_cleanup.clone());
    }

    fn on_task_failed(
        &self,
        task_name: &str,
        manual_cleanup: &PostTaskManualCleanup,
        _events: &[TaskEvent],
    ) {
        self.record_call("on_task_failed");
        self.failed
            .lock()
            .unwrap()
            .push((task_name.to_string(), manual_cleanup.clone()));
    }
}
