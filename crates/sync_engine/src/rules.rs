//! Coordinator rules.
//!
//! A [`Rule`] binds an [`EventKind`] to a handler task and a concurrency
//! [`Mode`]. The coordinator consults its rule set synchronously for every
//! emitted event.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::TaskContext;
use crate::event::{Event, EventKind};
use crate::handlers;

/// How repeated occurrences of an event kind are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A newer event with the same [`LatestKey`](crate::event::LatestKey)
    /// cancels the running instance before a fresh one starts.
    Latest,
    /// Every event starts an independent instance.
    Every,
}

/// A type-erased handler: builds the task future for one event.
pub type HandlerFn = Arc<dyn Fn(TaskContext, Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Binds an event kind to a handler.
#[derive(Clone)]
pub struct Rule {
    /// Task name used in logs.
    pub name: &'static str,
    /// The event kind that triggers the handler.
    pub kind: EventKind,
    /// Concurrency mode.
    pub mode: Mode,
    /// The handler.
    pub handler: HandlerFn,
}

impl Rule {
    /// Create a rule with the given mode.
    ///
    /// The handler is only called to build its future; it must not touch the
    /// context until polled.
    pub fn new<F, Fut>(name: &'static str, kind: EventKind, mode: Mode, handler: F) -> Self
    where
        F: Fn(TaskContext, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            kind,
            mode,
            handler: Arc::new(move |ctx, event| Box::pin(handler(ctx, event))),
        }
    }

    /// Latest-wins rule.
    pub fn latest<F, Fut>(name: &'static str, kind: EventKind, handler: F) -> Self
    where
        F: Fn(TaskContext, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(name, kind, Mode::Latest, handler)
    }

    /// Every-occurrence rule.
    pub fn every<F, Fut>(name: &'static str, kind: EventKind, handler: F) -> Self
    where
        F: Fn(TaskContext, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(name, kind, Mode::Every, handler)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// The fixed rule set of the sync engine.
///
/// | event              | mode   | handler         |
/// |--------------------|--------|-----------------|
/// | `FilterToggled`    | latest | list refetch    |
/// | `ItemSelected`     | latest | select item     |
/// | `FieldChanged`     | latest | debounced patch |
/// | `ItemsRequested`   | every  | list refetch    |
/// | `CreateRequested`  | every  | create item     |
#[must_use]
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::latest("request_items", EventKind::FilterToggled, handlers::request_items),
        Rule::latest("select_item", EventKind::ItemSelected, handlers::select_item),
        Rule::latest("patch_item", EventKind::FieldChanged, handlers::patch_item),
        Rule::every("request_items", EventKind::ItemsRequested, handlers::request_items),
        Rule::every("create_item", EventKind::CreateRequested, handlers::create_item),
    ]
}
