//! # sync_engine
//!
//! Effect coordinator keeping a client-side entity cache synchronized with a
//! REST backend.
//!
//! Intents enter as [`Event`]s through [`Coordinator::emit`]. The coordinator
//! reduces each event into the shared [`EntityStore`](sync_store::EntityStore)
//! and starts the handler tasks bound to it by its [`Rule`]s:
//!
//! - latest-wins rules cancel the superseded instance, so a stale result
//!   never reaches the store;
//! - every-occurrence rules run instances side by side;
//! - detached tasks, such as the route watcher, run until shutdown.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sync_engine::{Coordinator, Event, SyncConfig};
//! use sync_net::{ClientConfig, RestClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RestClient::new(&ClientConfig::from_env())?;
//!     let coordinator = Coordinator::start(Arc::new(client), SyncConfig::default())?;
//!     coordinator.emit(Event::ItemsRequested { collection: "issues".into() })?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod handlers;
pub mod reducer;
pub mod route;
pub mod rules;

#[cfg(test)]
mod test_support;

pub use config::SyncConfig;
pub use context::{Dispatched, EventStream, TaskContext};
pub use coordinator::Coordinator;
pub use error::SyncError;
pub use event::{Event, EventKind, LatestKey, LocationChange};
pub use rules::{Mode, Rule, default_rules};
