// src/engine/interrupt.rs

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::state_machine::TaskEventSink;
use crate::model::events::TaskFailure;

/// Turns Ctrl-C into a `UserInterruptedExecution` failure for as long as it
/// is alive. That failure cancels in-flight work and leads to normal cleanup.
#[derive(Debug)]
pub struct InterruptionTrap {
    handle: JoinHandle<()>,
}

impl InterruptionTrap {
    pub fn install(sink: Arc<dyn TaskEventSink>) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }

                info!("interrupt received, failing task");
                sink.post_event(TaskFailure::UserInterruptedExecution.into());
            }
        });

        Self { handle }
    }
}

impl Drop for InterruptionTrap {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
