//! Entity identifiers and cached entity data.
//!
//! An [`Entity`] is an opaque mapping of field name to JSON value that always
//! carries a positive integer `id`. Entities are owned by the store; readers
//! receive clones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sync_net::envelope::STATUS_KEY;

use crate::error::StoreError;

/// Field holding the entity identifier.
pub const ID_FIELD: &str = "id";

/// A backend entity identifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The "no selection" sentinel.
    pub const NONE: EntityId = EntityId(0);

    /// Create an id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is [`EntityId::NONE`].
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A cached entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    fields: Map<String, Value>,
}

impl Entity {
    /// Build an entity from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotAnObject`] for non-object payloads and
    /// [`StoreError::MissingId`] when `id` is absent, zero, or not an integer.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        let Value::Object(mut fields) = value else {
            return Err(StoreError::NotAnObject);
        };
        let id = fields
            .get(ID_FIELD)
            .and_then(Value::as_u64)
            .filter(|&id| id != 0)
            .ok_or(StoreError::MissingId)?;
        fields.remove(STATUS_KEY);
        Ok(Self {
            id: EntityId(id),
            fields,
        })
    }

    /// Build every entity of a list payload, all or nothing.
    ///
    /// Accepts a bare array or a paginated object with a `results` array.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidList`] if no entity array is found, or the
    /// first per-entity error.
    pub fn list_from_json(value: Value) -> Result<Vec<Self>, StoreError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut page) => match page.remove("results") {
                Some(Value::Array(items)) => items,
                _ => return Err(StoreError::InvalidList),
            },
            _ => return Err(StoreError::InvalidList),
        };
        items.into_iter().map(Self::from_json).collect()
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all fields, `id` included.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Replace every field present in `other`. Fields absent from `other` are kept.
    ///
    /// Returns `false` and leaves `self` unchanged if the ids differ.
    pub fn merge(&mut self, other: Entity) -> bool {
        if other.id != self.id {
            return false;
        }
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
        true
    }

    /// JSON form of the entity.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
