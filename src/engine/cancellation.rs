// src/engine/cancellation.rs

//! One-shot cancellation shared by every operation of a task run.
//!
//! Synchronous waits register a callback that unblocks them; async waits
//! can await [`CancellationContext::cancelled`] or wrap a future with
//! [`CancellationContext::run_cancellable`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::Cancelled;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Registry {
    cancelled: bool,
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
}

#[derive(Default)]
struct Inner {
    registry: Mutex<Registry>,
    token: CancellationToken,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct CancellationContext {
    inner: Arc<Inner>,
}

impl CancellationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.registry().cancelled
    }

    /// Register `callback` to run when the context is cancelled.
    ///
    /// If cancellation has already happened the callback runs right away
    /// and the returned registration does nothing.
    pub fn add_cancellation_callback(
        &self,
        callback: impl FnOnce() + Send + 'static,
    ) -> CancellationRegistration {
        let mut registry = self.inner.registry();

        if registry.cancelled {
            drop(registry);
            callback();
            return CancellationRegistration::noop();
        }

        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, Box::new(callback));

        CancellationRegistration {
            inner: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Mark the context cancelled and run every registered callback once.
    ///
    /// Later calls do nothing.
    pub fn cancel(&self) {
        let callbacks = {
            let mut registry = self.inner.registry();
            if registry.cancelled {
                return;
            }
            registry.cancelled = true;
            std::mem::take(&mut registry.callbacks)
        };

        debug!(callbacks = callbacks.len(), "cancelling in-flight operations");

        self.inner.token.cancel();
        for (_, callback) in callbacks {
            callback();
        }
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Run `future` unless cancellation happens first.
    pub async fn run_cancellable<F, T>(&self, future: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            output = future => Ok(output),
        }
    }
}

impl fmt::Debug for CancellationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry();
        f.debug_struct("CancellationContext")
            .field("cancelled", &registry.cancelled)
            .field("callbacks", &registry.callbacks.len())
            .finish()
    }
}

/// Removes its callback when dropped or explicitly deregistered.
#[must_use = "dropping the registration removes the callback immediately"]
pub struct CancellationRegistration {
    inner: Weak<Inner>,
    id: Option<u64>,
}

impl CancellationRegistration {
    fn noop() -> Self {
        Self {
            inner: Weak::new(),
            id: None,
        }
    }

    pub fn deregister(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };

        if let Some(inner) = self.inner.upgrade() {
            inner.registry().callbacks.remove(&id);
        }
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for CancellationRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationRegistration")
            .field("id", &self.id)
            .finish()
    }
}
