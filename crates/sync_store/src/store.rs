//! The process-wide entity store.
//!
//! [`EntityStore`] maps collection names to [`Collection`]s. It is the single
//! mutable resource shared by the sync engine: read at any time through
//! snapshots, written only by the engine's reducer.

use std::collections::HashMap;

use sync_net::Query;

use crate::collection::Collection;
use crate::entity::{Entity, EntityId};

/// The canonical client-side cache.
#[derive(Debug, Default)]
pub struct EntityStore {
    /// Collections keyed by name.
    collections: HashMap<String, Collection>,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Returns a collection by name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Returns a collection for writing, creating it if needed.
    pub fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name))
    }

    /// Returns a cached entity.
    #[must_use]
    pub fn entity(&self, collection: &str, id: EntityId) -> Option<&Entity> {
        self.collection(collection)?.entity(id)
    }

    /// Returns the active query of a collection, empty if the collection is unknown.
    #[must_use]
    pub fn query(&self, collection: &str) -> Query {
        self.collection(collection)
            .map(|c| c.query().clone())
            .unwrap_or_default()
    }

    /// Returns a read-only copy of a collection.
    #[must_use]
    pub fn snapshot(&self, collection: &str) -> Option<Collection> {
        self.collection(collection).cloned()
    }

    /// Returns an iterator over all collection names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Returns the total number of cached entities across collections.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.collections.values().map(Collection::len).sum()
    }
}
