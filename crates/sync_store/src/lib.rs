//! # sync_store
//!
//! The entity cache shared by every handler of the sync engine.
//!
//! This crate provides:
//!
//! - [`EntityId`] / [`Entity`]: identified field mappings received from the backend.
//! - [`Collection`]: cached entities, result order, query, selection, and
//!   [`PendingState`] for one resource collection.
//! - [`EntityStore`]: the process-wide mapping of collection name to [`Collection`].
//!
//! The store holds data only. Writes happen exclusively through the engine's
//! reducer, one event at a time.

pub mod collection;
pub mod entity;
pub mod error;
pub mod store;

pub use collection::{Collection, FetchStatus, PendingState};
pub use entity::{Entity, EntityId};
pub use error::StoreError;
pub use store::EntityStore;
