//! # sync_net
//!
//! REST transport layer for the entity sync engine.
//!
//! This crate provides:
//!
//! - [`query`]: canonical URL query-string encoding.
//! - [`envelope`]: the `{response}` / `{error}` outcome of every remote call.
//! - [`endpoints`]: URL builders for collections, entities, and auth.
//! - [`config`]: client configuration and CSRF cookie capture.
//! - [`client`]: the [`ResourceApi`] seam and its `reqwest` implementation.
//! - [`error`]: client construction errors.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod query;

pub use client::{ResourceApi, RestClient};
pub use config::ClientConfig;
pub use envelope::{Envelope, Failure, Reply};
pub use error::NetError;
pub use query::{Query, QueryValue, encode};
