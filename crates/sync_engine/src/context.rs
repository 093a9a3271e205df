//! Per-instance handler context.
//!
//! A [`TaskContext`] is handed to every handler instance. Its methods are the
//! effects a handler may perform:
//!
//! - [`select`](TaskContext::select): read a snapshot of the store, never suspends;
//! - [`call`](TaskContext::call): run an external operation and suspend until it settles;
//! - [`put`](TaskContext::put): emit an event, synchronously reduced and dispatched;
//! - [`EventStream::take`]: suspend until the next event of a kind;
//! - [`fork`](TaskContext::fork) and [`delay`](TaskContext::delay).
//!
//! A cancelled instance is dropped at its next suspension point, and any
//! event it still tries to emit is discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sync_net::ResourceApi;
use sync_store::EntityStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::coordinator::Shared;
use crate::event::{Event, EventKind};

/// Context of one running handler instance.
#[derive(Clone)]
pub struct TaskContext {
    shared: Arc<Shared>,
    token: CancellationToken,
    task: &'static str,
    instance: Uuid,
    stamp: u64,
}

impl TaskContext {
    pub(crate) fn new(
        shared: Arc<Shared>,
        token: CancellationToken,
        task: &'static str,
        stamp: u64,
    ) -> Self {
        Self {
            shared,
            token,
            task,
            instance: Uuid::new_v4(),
            stamp,
        }
    }

    /// Returns the task name.
    #[must_use]
    pub fn task(&self) -> &'static str {
        self.task
    }

    /// Returns the unique id of this instance.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    /// Sequence number of the event that started this instance.
    #[must_use]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Returns the coordinator configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        self.shared.config()
    }

    /// Returns the resource client.
    #[must_use]
    pub fn api(&self) -> Arc<dyn ResourceApi> {
        self.shared.api()
    }

    /// Returns `true` once a newer instance has superseded this one or the
    /// coordinator has shut down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Read shared state.
    pub fn select<R>(&self, read: impl FnOnce(&EntityStore) -> R) -> R {
        self.shared.read(read)
    }

    /// Run an external operation and wait for its result.
    ///
    /// The operation runs as its own task: cancelling this instance abandons
    /// the result but never aborts the operation. Returns `None` only if the
    /// operation panicked.
    pub async fn call<F, T>(&self, operation: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.shared.spawn(operation).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(task = self.task, instance = %self.instance, error = %err, "external operation failed to settle");
                None
            }
        }
    }

    /// Emit an event.
    ///
    /// The event is reduced into the store and dispatched to all bound rules
    /// before this returns. Returns `false` if the event was discarded because
    /// this instance is cancelled.
    pub fn put(&self, event: Event) -> bool {
        let accepted = self.shared.dispatch(event, Some(&self.token)).is_some();
        if !accepted {
            debug!(task = self.task, instance = %self.instance, "discarded event from cancelled task");
        }
        accepted
    }

    /// Start a child task that is not cancelled by newer intents, only by
    /// cancellation of this instance.
    pub fn fork<F, Fut>(&self, task: &'static str, stamp: u64, start: F)
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let child = TaskContext::new(
            Arc::clone(&self.shared),
            self.token.child_token(),
            task,
            stamp,
        );
        debug!(parent = self.task, task, instance = %child.instance, "fork");
        let token = child.token.clone();
        let instance = child.instance;
        let future = start(child);
        self.shared.spawn_guarded(task, instance, token, future);
    }

    /// Sleep for `duration`. Cancellation during the sleep ends the instance.
    pub async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.task)
            .field("instance", &self.instance)
            .field("stamp", &self.stamp)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// An event as dispatched, with its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The event.
    pub event: Event,
}

/// A subscription to dispatched events.
///
/// Every event dispatched after subscription is queued, in sequence order,
/// until it is read. Nothing is dropped however far the reader falls behind.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Dispatched>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Dispatched>) -> Self {
        Self { rx }
    }

    /// Wait for the next event of `kind`, skipping events of other kinds.
    ///
    /// Returns `None` once the coordinator is gone.
    pub async fn take(&mut self, kind: EventKind) -> Option<Dispatched> {
        while let Some(dispatched) = self.rx.recv().await {
            if dispatched.event.kind() == kind {
                return Some(dispatched);
            }
        }
        None
    }

    /// Wait for the next event of any kind.
    pub async fn next(&mut self) -> Option<Dispatched> {
        self.rx.recv().await
    }
}
