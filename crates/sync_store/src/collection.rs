//! Per-collection cache state.
//!
//! A [`Collection`] holds the cached entities of one resource collection, the
//! order of the most recent list result, the active query, the current
//! selection, and the [`PendingState`] of list fetches.

use std::collections::BTreeMap;
use std::time::Instant;

use sync_net::{Failure, Query, QueryValue};
use tracing::debug;

use crate::entity::{Entity, EntityId};

/// Lifecycle of the latest list fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStatus {
    /// No fetch has been started.
    #[default]
    Idle,
    /// A fetch is outstanding.
    Fetching,
    /// The latest fetch succeeded.
    Success,
    /// The latest fetch failed.
    Failed,
}

/// Fetch state of a collection plus the stamp of the intent that started it.
///
/// Stamps increase monotonically; a result carrying a stamp older than
/// [`PendingState::stamp`] is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingState {
    /// Current status.
    pub status: FetchStatus,
    /// Stamp of the most recent initiating intent.
    pub stamp: u64,
    /// When the most recent fetch started.
    pub since: Option<Instant>,
}

impl PendingState {
    /// Returns `true` if a result with `stamp` must be discarded.
    #[must_use]
    pub fn is_stale(&self, stamp: u64) -> bool {
        stamp < self.stamp
    }
}

/// Cached state of one resource collection.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    entities: BTreeMap<EntityId, Entity>,
    results: Vec<EntityId>,
    query: Query,
    selected: EntityId,
    pending: PendingState,
    last_error: Option<Failure>,
}

impl Collection {
    /// Create an empty collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: BTreeMap::new(),
            results: Vec::new(),
            query: Query::new(),
            selected: EntityId::NONE,
            pending: PendingState::default(),
            last_error: None,
        }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a cached entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns an iterator over all cached entities, ordered by id.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Returns the number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities of the most recent list result, in server order.
    pub fn results(&self) -> impl Iterator<Item = &Entity> {
        self.results.iter().filter_map(|id| self.entities.get(id))
    }

    /// Returns the active list query.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the selected entity id, [`EntityId::NONE`] if nothing is selected.
    #[must_use]
    pub fn selected(&self) -> EntityId {
        self.selected
    }

    /// Returns the selected entity if it is cached.
    #[must_use]
    pub fn selected_entity(&self) -> Option<&Entity> {
        self.entities.get(&self.selected)
    }

    /// Returns the list fetch state.
    #[must_use]
    pub fn pending(&self) -> PendingState {
        self.pending
    }

    /// Returns the most recent failure recorded for this collection.
    #[must_use]
    pub fn last_error(&self) -> Option<&Failure> {
        self.last_error.as_ref()
    }

    /// Replace the active query.
    pub fn set_query(&mut self, query: Query) {
        self.query = query;
    }

    /// Toggle a filter: setting the value it already has, or a falsy value,
    /// removes the key; anything else sets it.
    pub fn toggle_filter(&mut self, key: &str, value: QueryValue) {
        if value.is_falsy() || self.query.get(key) == Some(&value) {
            self.query.shift_remove(key);
        } else {
            self.query.insert(key.to_string(), value);
        }
    }

    /// Mark a list fetch as started by the intent with `stamp`.
    ///
    /// Returns `false` if a newer fetch has already started.
    pub fn begin_fetch(&mut self, stamp: u64) -> bool {
        if self.pending.is_stale(stamp) {
            return false;
        }
        self.pending = PendingState {
            status: FetchStatus::Fetching,
            stamp,
            since: Some(Instant::now()),
        };
        true
    }

    /// Replace the cached set with a list result.
    ///
    /// Returns `false` and changes nothing if `stamp` is stale.
    pub fn replace_results(&mut self, stamp: u64, items: Vec<Entity>) -> bool {
        if self.pending.is_stale(stamp) {
            debug!(
                collection = %self.name,
                stamp,
                current = self.pending.stamp,
                "discarding stale list result"
            );
            return false;
        }
        self.results = items.iter().map(Entity::id).collect();
        self.entities = items.into_iter().map(|e| (e.id(), e)).collect();
        self.pending.status = FetchStatus::Success;
        self.pending.stamp = stamp;
        self.last_error = None;
        true
    }

    /// Merge an entity into the cache, inserting it if absent.
    pub fn merge_entity(&mut self, entity: Entity) {
        match self.entities.get_mut(&entity.id()) {
            Some(existing) => {
                existing.merge(entity);
            }
            None => {
                self.entities.insert(entity.id(), entity);
            }
        }
    }

    /// Set the current selection.
    pub fn select(&mut self, id: EntityId) {
        self.selected = id;
    }

    /// Record a failure. If it belongs to the outstanding list fetch, that
    /// fetch is marked failed.
    ///
    /// Returns `false` and changes nothing if `stamp` belongs to a list fetch
    /// older than the latest started one.
    pub fn fail(&mut self, stamp: Option<u64>, failure: Failure) -> bool {
        if let Some(stamp) = stamp {
            if self.pending.is_stale(stamp) {
                debug!(
                    collection = %self.name,
                    stamp,
                    current = self.pending.stamp,
                    "discarding stale list failure"
                );
                return false;
            }
            if self.pending.status == FetchStatus::Fetching {
                self.pending.status = FetchStatus::Failed;
            }
        }
        self.last_error = Some(failure);
        true
    }
}
