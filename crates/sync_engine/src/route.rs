//! Route watcher.
//!
//! A detached task translating router location changes into sync intents: a
//! route showing the configured model refetches its collection, and the `id`
//! path parameter becomes the current selection.

use tracing::{debug, info};

use crate::context::{Dispatched, EventStream, TaskContext};
use crate::event::{Event, EventKind};
use crate::handlers;

/// Watch route changes forever.
pub async fn watch_route_change(ctx: TaskContext, mut events: EventStream) {
    info!(route_model = %ctx.config().route_model, "watching route changes");
    while let Some(Dispatched { seq, event }) = events.take(EventKind::RouteChanged).await {
        let Event::RouteChanged { payload } = event else {
            continue;
        };
        let collection = ctx.config().collection.clone();
        debug!(seq, model = ?payload.model(), id = ?payload.params.id, "route changed");

        if payload.model() == Some(ctx.config().route_model.as_str()) {
            let target = collection.clone();
            ctx.fork("fetch_items", seq, move |child| handlers::fetch_items(child, target));
        }
        ctx.put(Event::ItemSelected {
            collection,
            id: payload.selected_id(),
        });
    }
}
