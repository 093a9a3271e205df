//! Handler tasks bound by the default rule set.
//!
//! Each handler reads the store, calls the backend through
//! [`TaskContext::call`], and reports the outcome as an event. Both transport
//! and API failures become a single [`Event::RequestFailed`]; nothing is
//! retried.

use serde_json::{Map, Value};
use sync_net::Envelope;
use tracing::{debug, info, warn};

use crate::context::TaskContext;
use crate::event::Event;

/// Select an entity, fetching it if it is not cached.
///
/// No request is made for [`EntityId::NONE`](sync_store::EntityId::NONE) or an
/// id already in the store.
pub async fn select_item(ctx: TaskContext, event: Event) {
    let Event::ItemSelected { collection, id } = event else {
        return;
    };
    let cached = ctx.select(|store| store.entity(&collection, id).is_some());
    if !id.is_some() || cached {
        debug!(%collection, %id, cached, "selection served from cache");
        return;
    }

    let api = ctx.api();
    let name = collection.clone();
    let Some(envelope) = ctx.call(async move { api.get(&name, id.id()).await }).await else {
        return;
    };
    match envelope {
        Envelope::Response(reply) => {
            ctx.put(Event::EntityAdded {
                collection,
                entity: reply.data,
            });
        }
        Envelope::Error(failure) => {
            ctx.put(Event::RequestFailed {
                collection,
                stamp: None,
                failure,
            });
        }
    }
}

/// Refetch the list of the event's collection.
pub async fn request_items(ctx: TaskContext, event: Event) {
    let Some(collection) = event.collection().map(str::to_string) else {
        return;
    };
    fetch_items(ctx, collection).await;
}

/// Fetch a collection with its current query and replace its result set.
///
/// The fetch is stamped with the sequence number of the triggering intent so
/// the store can discard results older than the latest started fetch.
pub async fn fetch_items(ctx: TaskContext, collection: String) {
    let stamp = ctx.stamp();
    ctx.put(Event::FetchStarted {
        collection: collection.clone(),
        stamp,
    });
    let attrs = ctx.select(|store| store.query(&collection));
    info!(%collection, stamp, filters = attrs.len(), "fetching items");

    let api = ctx.api();
    let name = collection.clone();
    let Some(envelope) = ctx.call(async move { api.list(&name, &attrs).await }).await else {
        return;
    };
    match envelope {
        Envelope::Response(reply) => {
            ctx.put(Event::ItemsFetched {
                collection,
                stamp,
                items: reply.data,
            });
        }
        Envelope::Error(failure) => {
            ctx.put(Event::RequestFailed {
                collection,
                stamp: Some(stamp),
                failure,
            });
        }
    }
}

/// Patch one field after the debounce period.
///
/// A newer edit of the same field cancels this instance while it waits, so
/// only the last edit of a burst reaches the backend. A failed patch is not
/// rolled back: the store still holds the last server-confirmed entity.
pub async fn patch_item(ctx: TaskContext, event: Event) {
    let Event::FieldChanged {
        collection,
        id,
        field,
        value,
    } = event
    else {
        return;
    };
    if !id.is_some() {
        warn!(%collection, %field, "ignoring edit without entity id");
        return;
    }

    ctx.delay(ctx.config().debounce).await;

    let mut partial = Map::new();
    partial.insert(field.clone(), value);
    let partial = Value::Object(partial);
    info!(%collection, %id, %field, "patching");

    let api = ctx.api();
    let name = collection.clone();
    let Some(envelope) = ctx
        .call(async move { api.patch(&name, id.id(), &partial).await })
        .await
    else {
        return;
    };
    match envelope {
        Envelope::Response(reply) => {
            ctx.put(Event::ItemPatched {
                collection,
                entity: reply.data,
            });
        }
        Envelope::Error(failure) => {
            warn!(%collection, %id, %field, "patch failed; edit dropped");
            ctx.put(Event::RequestFailed {
                collection,
                stamp: None,
                failure,
            });
        }
    }
}

/// Create an entity and add the server's copy to the store.
pub async fn create_item(ctx: TaskContext, event: Event) {
    let Event::CreateRequested { collection, body } = event else {
        return;
    };
    let api = ctx.api();
    let name = collection.clone();
    let Some(envelope) = ctx.call(async move { api.post(&name, &body).await }).await else {
        return;
    };
    match envelope {
        Envelope::Response(reply) => {
            ctx.put(Event::EntityAdded {
                collection,
                entity: reply.data,
            });
        }
        Envelope::Error(failure) => {
            ctx.put(Event::RequestFailed {
                collection,
                stamp: None,
                failure,
            });
        }
    }
}
