//! Store reducer.
//!
//! [`apply`] is the only code that writes to the [`EntityStore`]. Each event
//! is applied completely or, if its payload is malformed, not at all.

use sync_store::{Entity, EntityStore};
use tracing::{debug, warn};

use crate::event::Event;

/// Apply an event to the store.
///
/// Returns `true` if the store changed.
pub fn apply(store: &mut EntityStore, event: &Event) -> bool {
    match event {
        Event::FilterToggled {
            collection,
            key,
            value,
        } => {
            store
                .collection_mut(collection)
                .toggle_filter(key, value.clone());
            true
        }
        Event::ItemSelected { collection, id } => {
            store.collection_mut(collection).select(*id);
            true
        }
        Event::FetchStarted { collection, stamp } => {
            store.collection_mut(collection).begin_fetch(*stamp)
        }
        Event::ItemsFetched {
            collection,
            stamp,
            items,
        } => match Entity::list_from_json(items.clone()) {
            Ok(entities) => {
                let count = entities.len();
                let applied = store
                    .collection_mut(collection)
                    .replace_results(*stamp, entities);
                debug!(%collection, stamp, count, applied, "items fetched");
                applied
            }
            Err(err) => {
                warn!(%collection, stamp, error = %err, "rejected list payload");
                false
            }
        },
        Event::EntityAdded { collection, entity } | Event::ItemPatched { collection, entity } => {
            match Entity::from_json(entity.clone()) {
                Ok(entity) => {
                    debug!(%collection, id = entity.id().id(), "entity merged");
                    store.collection_mut(collection).merge_entity(entity);
                    true
                }
                Err(err) => {
                    warn!(%collection, error = %err, "rejected entity payload");
                    false
                }
            }
        }
        Event::RequestFailed {
            collection,
            stamp,
            failure,
        } => {
            warn!(%collection, ?stamp, error = %failure, "request failed");
            store.collection_mut(collection).fail(*stamp, failure.clone())
        }
        Event::RouteChanged { .. }
        | Event::ItemsRequested { .. }
        | Event::FieldChanged { .. }
        | Event::CreateRequested { .. } => false,
    }
}
