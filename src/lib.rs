//! shellcache - offline application-shell cache.
//!
//! Sits between a client application and the network. Each outbound GET
//! request is routed through an ordered rule table to one of three
//! strategies (cache-first, network-first, bypass) and served from a
//! versioned SQLite store when appropriate.
//!
//! # Modules
//!
//! - [`store`] - Named caches of request → response snapshots
//! - [`generation`] - Versioned generations: populate, promote, collect
//! - [`strategy`] - Rule table, dispatcher and strategy executors
//! - [`lifecycle`] - Worker install/activate sequence and request handling
//! - [`clients`] - Open clients and the generation controlling each
//! - [`network`] - `Fetch` trait and the reqwest-backed client
//! - [`config`] - YAML configuration
//! - [`error`] - Error types

pub mod clients;
pub mod config;
pub mod error;
pub mod generation;
pub mod lifecycle;
pub mod network;
pub mod store;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use error::{CacheError, Result};
