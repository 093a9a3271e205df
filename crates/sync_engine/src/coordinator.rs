//! The effect coordinator.
//!
//! The [`Coordinator`] owns the [`EntityStore`] and a fixed set of [`Rule`]s.
//! Every event, whether emitted from outside or put by a handler, goes through
//! one synchronous dispatch step under a single lock:
//!
//! 1. Drop the event if its emitting instance has been cancelled.
//! 2. Assign the next sequence number.
//! 3. Reduce the event into the store.
//! 4. For each bound rule: cancel the superseded instance (latest-wins) and
//!    spawn a fresh handler instance.
//! 5. Queue the event on every [`EventStream`] subscription.
//!
//! Because handlers only mutate the store through dispatch, and a cancelled
//! instance is checked under the same lock that cancels it, a superseded
//! instance can never write its result into the store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use sync_net::ResourceApi;
use sync_store::{Collection, EntityStore};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::context::{Dispatched, EventStream, TaskContext};
use crate::error::SyncError;
use crate::event::{Event, EventKind, LatestKey};
use crate::reducer;
use crate::route;
use crate::rules::{Mode, Rule, default_rules};

/// Mutable coordinator state, guarded by one lock.
#[derive(Debug, Default)]
struct State {
    /// The shared entity cache.
    store: EntityStore,
    /// Sequence number of the last dispatched event.
    seq: u64,
    /// Running latest-wins instances, removed when they finish.
    latest: HashMap<(EventKind, LatestKey), Running>,
    /// Open event subscriptions.
    subscribers: Vec<mpsc::UnboundedSender<Dispatched>>,
}

/// A running latest-wins instance.
#[derive(Debug)]
struct Running {
    instance: Uuid,
    token: CancellationToken,
}

/// State shared between the coordinator handle and all task contexts.
pub(crate) struct Shared {
    api: Arc<dyn ResourceApi>,
    config: SyncConfig,
    rules: Vec<Rule>,
    state: Mutex<State>,
    root: CancellationToken,
    runtime: Handle,
}

impl Shared {
    pub(crate) fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub(crate) fn api(&self) -> Arc<dyn ResourceApi> {
        Arc::clone(&self.api)
    }

    pub(crate) fn read<R>(&self, read: impl FnOnce(&EntityStore) -> R) -> R {
        read(&self.state.lock().store)
    }

    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Spawn a task that ends as soon as `token` is cancelled.
    pub(crate) fn spawn_guarded<F>(
        &self,
        task: &'static str,
        instance: Uuid,
        token: CancellationToken,
        future: F,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => debug!(task, %instance, "task cancelled"),
                () = future => debug!(task, %instance, "task finished"),
            }
        });
    }

    /// Reduce and dispatch an event. Returns its sequence number, or `None`
    /// if the event was dropped because `origin` (or the coordinator) is
    /// cancelled.
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        event: Event,
        origin: Option<&CancellationToken>,
    ) -> Option<u64> {
        let mut state = self.state.lock();
        if self.root.is_cancelled() || origin.is_some_and(CancellationToken::is_cancelled) {
            return None;
        }

        state.seq += 1;
        let seq = state.seq;
        let kind = event.kind();
        reducer::apply(&mut state.store, &event);

        for rule in self.rules.iter().filter(|rule| rule.kind == kind) {
            let token = self.root.child_token();
            let ctx = TaskContext::new(Arc::clone(self), token.clone(), rule.name, seq);
            let instance = ctx.instance_id();
            debug!(task = rule.name, %instance, seq, ?kind, "spawning handler");
            let handler = (rule.handler)(ctx, event.clone());
            match rule.mode {
                Mode::Latest => {
                    let key = (kind, event.latest_key());
                    let running = Running {
                        instance,
                        token: token.clone(),
                    };
                    if let Some(previous) = state.latest.insert(key.clone(), running)
                        && !previous.token.is_cancelled()
                    {
                        debug!(task = rule.name, seq, superseded = %previous.instance, "superseding running instance");
                        previous.token.cancel();
                    }
                    let shared = Arc::clone(self);
                    let future = async move {
                        handler.await;
                        shared.release(&key, instance);
                    };
                    self.spawn_guarded(rule.name, instance, token, future);
                }
                Mode::Every => self.spawn_guarded(rule.name, instance, token, handler),
            }
        }

        state.subscribers.retain(|tx| {
            tx.send(Dispatched {
                seq,
                event: event.clone(),
            })
            .is_ok()
        });
        Some(seq)
    }

    /// Forget a finished latest-wins instance unless a newer one took its slot.
    fn release(&self, key: &(EventKind, LatestKey), instance: Uuid) {
        let mut state = self.state.lock();
        if state
            .latest
            .get(key)
            .is_some_and(|running| running.instance == instance)
        {
            state.latest.remove(key);
        }
    }

    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().subscribers.push(tx);
        EventStream::new(rx)
    }
}

/// Handle to a running sync engine.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Start the engine with the default rule set and the route watcher.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoRuntime`] outside a Tokio runtime.
    pub fn start(api: Arc<dyn ResourceApi>, config: SyncConfig) -> Result<Self, SyncError> {
        let coordinator = Self::with_rules(api, config, default_rules())?;
        coordinator.spawn_detached("watch_route_change", route::watch_route_change);
        Ok(coordinator)
    }

    /// Start the engine with a custom rule set and no detached tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoRuntime`] outside a Tokio runtime.
    pub fn with_rules(
        api: Arc<dyn ResourceApi>,
        config: SyncConfig,
        rules: Vec<Rule>,
    ) -> Result<Self, SyncError> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        info!(
            collection = %config.collection,
            route_model = %config.route_model,
            debounce_ms = config.debounce.as_millis() as u64,
            rules = rules.len(),
            "coordinator starting"
        );
        let shared = Shared {
            api,
            config,
            rules,
            state: Mutex::new(State::default()),
            root: CancellationToken::new(),
            runtime,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Start a long-lived task that is only cancelled by [`shutdown`](Self::shutdown).
    ///
    /// The task's event stream is subscribed before the task is spawned, so it
    /// sees every event emitted after this call.
    pub fn spawn_detached<F, Fut>(&self, task: &'static str, start: F)
    where
        F: FnOnce(TaskContext, EventStream) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let events = self.subscribe();
        let token = self.shared.root.child_token();
        let ctx = TaskContext::new(Arc::clone(&self.shared), token.clone(), task, 0);
        let instance = ctx.instance_id();
        info!(task, %instance, "detached task started");
        self.shared
            .spawn_guarded(task, instance, token, start(ctx, events));
    }

    /// Emit an intent. Returns the event's sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn emit(&self, event: Event) -> Result<u64, SyncError> {
        self.shared.dispatch(event, None).ok_or(SyncError::ShutDown)
    }

    /// Read the store.
    pub fn read<R>(&self, read: impl FnOnce(&EntityStore) -> R) -> R {
        self.shared.read(read)
    }

    /// Returns a read-only copy of a collection.
    #[must_use]
    pub fn snapshot(&self, collection: &str) -> Option<Collection> {
        self.read(|store| store.snapshot(collection))
    }

    /// Subscribe to dispatched events.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        self.shared.subscribe()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        self.shared.config()
    }

    /// Cancel every running task and refuse further events.
    ///
    /// Open subscriptions end once their queued events are read.
    pub fn shutdown(&self) {
        if !self.shared.root.is_cancelled() {
            self.shared.root.cancel();
            let mut state = self.shared.state.lock();
            state.subscribers.clear();
            state.latest.clear();
            info!("coordinator shut down");
        }
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.root.is_cancelled()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.shared.config)
            .field("rules", &self.shared.rules)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use sync_store::EntityId;

    use super::*;
    use crate::test_support::{MockApi, advance, settle};

    fn requested() -> Event {
        Event::ItemsRequested {
            collection: "issues".into(),
        }
    }

    /// A coordinator whose only rule records the stamp of each finished instance.
    fn probe(mode: Mode) -> (Coordinator, Arc<Mutex<Vec<u64>>>) {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&finished);
        let rule = Rule::new("probe", EventKind::ItemsRequested, mode, move |ctx, _| {
            let log = Arc::clone(&log);
            async move {
                ctx.delay(Duration::from_millis(100)).await;
                log.lock().push(ctx.stamp());
            }
        });
        let api: Arc<dyn ResourceApi> = MockApi::new();
        let coordinator = Coordinator::with_rules(api, SyncConfig::default(), vec![rule]).unwrap();
        (coordinator, finished)
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_rule_keeps_only_newest_instance() {
        let (coordinator, finished) = probe(Mode::Latest);
        coordinator.emit(requested()).unwrap();
        advance(10).await;
        coordinator.emit(requested()).unwrap();
        advance(10).await;
        let last = coordinator.emit(requested()).unwrap();
        settle().await;

        assert_eq!(*finished.lock(), vec![last]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_rule_runs_all_instances() {
        let (coordinator, finished) = probe(Mode::Every);
        for _ in 0..3 {
            coordinator.emit(requested()).unwrap();
        }
        settle().await;

        let mut stamps = finished.lock().clone();
        stamps.sort_unstable();
        assert_eq!(stamps, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_instance_cannot_write() {
        let captured: Arc<Mutex<Vec<TaskContext>>> = Arc::new(Mutex::new(Vec::new()));
        let slot = Arc::clone(&captured);
        let rule = Rule::latest("capture", EventKind::ItemsRequested, move |ctx, _| {
            let slot = Arc::clone(&slot);
            async move { slot.lock().push(ctx) }
        });
        let api: Arc<dyn ResourceApi> = MockApi::new();
        let coordinator = Coordinator::with_rules(api, SyncConfig::default(), vec![rule]).unwrap();

        coordinator.emit(requested()).unwrap();
        settle().await;
        coordinator.emit(requested()).unwrap();
        settle().await;

        let contexts = captured.lock().clone();
        assert_eq!(contexts.len(), 2);
        assert!(contexts[0].is_cancelled());
        assert!(!contexts[1].is_cancelled());

        let stale = contexts[0].put(Event::EntityAdded {
            collection: "issues".into(),
            entity: json!({"id": 1}),
        });
        assert!(!stale);
        assert!(coordinator.read(|store| store.entity("issues", EntityId(1)).is_none()));

        assert!(contexts[1].put(Event::EntityAdded {
            collection: "issues".into(),
            entity: json!({"id": 2}),
        }));
        assert!(coordinator.read(|store| store.entity("issues", EntityId(2)).is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_events_in_order() {
        let api: Arc<dyn ResourceApi> = MockApi::new();
        let coordinator = Coordinator::with_rules(api, SyncConfig::default(), Vec::new()).unwrap();
        let mut events = coordinator.subscribe();

        coordinator.emit(requested()).unwrap();
        coordinator
            .emit(Event::ItemSelected {
                collection: "issues".into(),
                id: EntityId(4),
            })
            .unwrap();

        let first = events.next().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.event, requested());
        let selected = events.take(EventKind::ItemSelected).await.unwrap();
        assert_eq!(selected.seq, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_after_shutdown_fails() {
        let api = MockApi::new();
        let coordinator = crate::test_support::start(&api);
        coordinator.shutdown();

        assert!(coordinator.is_shut_down());
        assert_eq!(coordinator.emit(requested()), Err(SyncError::ShutDown));
        settle().await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_patch() {
        let api = MockApi::new();
        api.insert(json!({"id": 7}));
        let coordinator = crate::test_support::start(&api);

        coordinator
            .emit(Event::FieldChanged {
                collection: "issues".into(),
                id: EntityId(7),
                field: "description".into(),
                value: json!("draft"),
            })
            .unwrap();
        advance(100).await;
        coordinator.shutdown();
        settle().await;

        assert!(api.patches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_latest_instances_are_released() {
        let api = MockApi::new();
        for id in 1..=3 {
            api.insert(json!({"id": id, "name": "", "description": ""}));
        }
        let coordinator = crate::test_support::start(&api);
        let running = || coordinator.shared.state.lock().latest.len();

        for id in 1..=3 {
            for field in ["name", "description"] {
                coordinator
                    .emit(Event::FieldChanged {
                        collection: "issues".into(),
                        id: EntityId(id),
                        field: field.into(),
                        value: json!("edited"),
                    })
                    .unwrap();
            }
        }
        advance(100).await;
        assert_eq!(running(), 6);

        settle().await;
        assert_eq!(api.patches().len(), 6);
        assert_eq!(running(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_slot_is_released_by_newest_instance() {
        let (coordinator, finished) = probe(Mode::Latest);
        coordinator.emit(requested()).unwrap();
        advance(10).await;
        coordinator.emit(requested()).unwrap();
        settle().await;

        assert_eq!(finished.lock().len(), 1);
        assert!(coordinator.shared.state.lock().latest.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_receives_burst_without_loss() {
        let api: Arc<dyn ResourceApi> = MockApi::new();
        let coordinator = Coordinator::with_rules(api, SyncConfig::default(), Vec::new()).unwrap();
        let mut events = coordinator.subscribe();

        for stamp in 1..=1000 {
            coordinator
                .emit(Event::FetchStarted {
                    collection: "other".into(),
                    stamp,
                })
                .unwrap();
        }

        for expected in 1..=1000 {
            assert_eq!(events.next().await.unwrap().seq, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_subscriptions_after_queued_events() {
        let api: Arc<dyn ResourceApi> = MockApi::new();
        let coordinator = Coordinator::with_rules(api, SyncConfig::default(), Vec::new()).unwrap();
        let mut events = coordinator.subscribe();

        coordinator.emit(requested()).unwrap();
        coordinator.shutdown();

        assert_eq!(events.next().await.map(|d| d.seq), Some(1));
        assert!(events.next().await.is_none());
    }

    #[test]
    fn test_start_requires_runtime() {
        let api: Arc<dyn ResourceApi> = MockApi::new();
        let result = Coordinator::start(api, SyncConfig::default());
        assert_eq!(result.err(), Some(SyncError::NoRuntime));
    }
}
