//! Events flowing through the coordinator.
//!
//! Intents (route changes, filter toggles, selections, edits) and outcomes
//! (fetched lists, added or patched entities, failures) share one tagged
//! [`Event`] type. Every emitted event is reduced into the store and then
//! matched against the coordinator's rules by its [`EventKind`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_net::{Failure, QueryValue};
use sync_store::EntityId;

/// An intent or outcome event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // ── Intents ─────────────────────────────────────────────────────────────
    /// The router moved to a new location.
    RouteChanged {
        /// Resolved route.
        #[serde(default)]
        payload: LocationChange,
    },

    /// A list filter was toggled; refetches the list, latest wins.
    FilterToggled {
        collection: String,
        key: String,
        value: QueryValue,
    },

    /// Explicit list load; every occurrence runs.
    ItemsRequested { collection: String },

    /// An entity was selected ([`EntityId::NONE`] clears the selection).
    ItemSelected { collection: String, id: EntityId },

    /// A field was edited; patched after the debounce period, latest wins per field.
    FieldChanged {
        collection: String,
        id: EntityId,
        field: String,
        value: Value,
    },

    /// Create a new entity from `body`.
    CreateRequested { collection: String, body: Value },

    // ── Outcomes ────────────────────────────────────────────────────────────
    /// A list fetch started for the intent with `stamp`.
    FetchStarted { collection: String, stamp: u64 },

    /// A list fetch succeeded; replaces the collection's result set.
    ItemsFetched {
        collection: String,
        stamp: u64,
        items: Value,
    },

    /// A single entity was fetched or created.
    EntityAdded { collection: String, entity: Value },

    /// A patch succeeded; merges the returned fields.
    ItemPatched { collection: String, entity: Value },

    /// A remote call failed. `stamp` is set for list fetches.
    RequestFailed {
        collection: String,
        stamp: Option<u64>,
        failure: Failure,
    },
}

/// The fieldless discriminant of an [`Event`], used to bind rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RouteChanged,
    FilterToggled,
    ItemsRequested,
    ItemSelected,
    FieldChanged,
    CreateRequested,
    FetchStarted,
    ItemsFetched,
    EntityAdded,
    ItemPatched,
    RequestFailed,
}

/// Identifies which running instance a latest-wins event supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LatestKey {
    /// Events not tied to a collection.
    Global,
    /// One instance per collection.
    Collection(String),
    /// One instance per edited field of one entity.
    Field {
        collection: String,
        id: EntityId,
        field: String,
    },
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RouteChanged { .. } => EventKind::RouteChanged,
            Self::FilterToggled { .. } => EventKind::FilterToggled,
            Self::ItemsRequested { .. } => EventKind::ItemsRequested,
            Self::ItemSelected { .. } => EventKind::ItemSelected,
            Self::FieldChanged { .. } => EventKind::FieldChanged,
            Self::CreateRequested { .. } => EventKind::CreateRequested,
            Self::FetchStarted { .. } => EventKind::FetchStarted,
            Self::ItemsFetched { .. } => EventKind::ItemsFetched,
            Self::EntityAdded { .. } => EventKind::EntityAdded,
            Self::ItemPatched { .. } => EventKind::ItemPatched,
            Self::RequestFailed { .. } => EventKind::RequestFailed,
        }
    }

    /// Returns the collection this event concerns, if any.
    #[must_use]
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::RouteChanged { .. } => None,
            Self::FilterToggled { collection, .. }
            | Self::ItemsRequested { collection }
            | Self::ItemSelected { collection, .. }
            | Self::FieldChanged { collection, .. }
            | Self::CreateRequested { collection, .. }
            | Self::FetchStarted { collection, .. }
            | Self::ItemsFetched { collection, .. }
            | Self::EntityAdded { collection, .. }
            | Self::ItemPatched { collection, .. }
            | Self::RequestFailed { collection, .. } => Some(collection),
        }
    }

    /// Returns the supersession key: a newer latest-wins event with the same
    /// kind and key cancels the running instance.
    #[must_use]
    pub fn latest_key(&self) -> LatestKey {
        match self {
            Self::FieldChanged {
                collection,
                id,
                field,
                ..
            } => LatestKey::Field {
                collection: collection.clone(),
                id: *id,
                field: field.clone(),
            },
            other => other
                .collection()
                .map_or(LatestKey::Global, |c| LatestKey::Collection(c.to_string())),
        }
    }
}

/// A location change reported by the router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationChange {
    /// The resolved route.
    #[serde(default)]
    pub result: RouteResult,
    /// Path parameters.
    #[serde(default)]
    pub params: RouteParams,
}

/// The route the router resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Model the route displays.
    #[serde(default)]
    pub model: Option<String>,
}

/// Path parameters of a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteParams {
    /// The `id` path segment, as written in the URL.
    #[serde(default)]
    pub id: Option<String>,
}

impl LocationChange {
    /// Build a location change for `model` with an optional `id` parameter.
    #[must_use]
    pub fn new(model: Option<&str>, id: Option<&str>) -> Self {
        Self {
            result: RouteResult {
                model: model.map(str::to_string),
            },
            params: RouteParams {
                id: id.map(str::to_string),
            },
        }
    }

    /// Returns the resolved model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.result.model.as_deref()
    }

    /// The entity selected by the route.
    ///
    /// The leading decimal digits of the `id` parameter are used; a missing or
    /// non-numeric id selects [`EntityId::NONE`].
    #[must_use]
    pub fn selected_id(&self) -> EntityId {
        let Some(raw) = self.params.id.as_deref() else {
            return EntityId::NONE;
        };
        let digits: String = raw
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().map_or(EntityId::NONE, EntityId::from_raw)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_route_event_from_json() {
        let event: Event = serde_json::from_value(json!({
            "type": "route_changed",
            "payload": {"result": {"model": "issue"}, "params": {"id": "42"}}
        }))
        .unwrap();
        let Event::RouteChanged { payload } = &event else {
            panic!("expected route event");
        };
        assert_eq!(payload.model(), Some("issue"));
        assert_eq!(payload.selected_id(), EntityId(42));
        assert_eq!(event.kind(), EventKind::RouteChanged);
    }

    #[test]
    fn test_route_event_missing_fields() {
        let event: Event = serde_json::from_value(json!({"type": "route_changed"})).unwrap();
        let Event::RouteChanged { payload } = event else {
            panic!("expected route event");
        };
        assert_eq!(payload.model(), None);
        assert_eq!(payload.selected_id(), EntityId::NONE);
    }

    #[test]
    fn test_selected_id_parsing() {
        assert_eq!(LocationChange::new(None, Some("17-slug")).selected_id(), EntityId(17));
        assert_eq!(LocationChange::new(None, Some("abc")).selected_id(), EntityId::NONE);
        assert_eq!(LocationChange::new(None, Some("")).selected_id(), EntityId::NONE);
    }

    #[test]
    fn test_intent_from_json() {
        let event: Event = serde_json::from_value(json!({
            "type": "field_changed",
            "collection": "issues",
            "id": 7,
            "field": "description",
            "value": "Hello"
        }))
        .unwrap();
        assert_eq!(event.kind(), EventKind::FieldChanged);
        assert_eq!(event.collection(), Some("issues"));

        let event: Event = serde_json::from_value(json!({
            "type": "filter_toggled",
            "collection": "issues",
            "key": "status",
            "value": [1, 2]
        }))
        .unwrap();
        assert!(matches!(
            event,
            Event::FilterToggled { value: QueryValue::List(_), .. }
        ));
    }

    #[test]
    fn test_latest_key_per_field() {
        let edit = |field: &str| Event::FieldChanged {
            collection: "issues".into(),
            id: EntityId(7),
            field: field.into(),
            value: json!("x"),
        };
        assert_eq!(edit("description").latest_key(), edit("description").latest_key());
        assert_ne!(edit("description").latest_key(), edit("name").latest_key());
    }

    #[test]
    fn test_latest_key_per_collection() {
        let select = Event::ItemSelected {
            collection: "issues".into(),
            id: EntityId(1),
        };
        assert_eq!(select.latest_key(), LatestKey::Collection("issues".into()));
        let route = Event::RouteChanged {
            payload: LocationChange::default(),
        };
        assert_eq!(route.latest_key(), LatestKey::Global);
    }
}
