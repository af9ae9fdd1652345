//! Durable store of request → response snapshots, partitioned into named
//! caches (one per generation).
//!
//! - Request identity is the method plus the URL without its fragment;
//!   only GET requests ever have one
//! - Only status-200 responses are accepted for writes
//! - Bulk writes are transactional
//! - The backend also persists which cache is the current generation

mod handle;
mod storage;
mod traits;

pub use handle::{Cache, CacheStore};
pub use storage::SqliteStorage;
pub use traits::{CacheStorage, CachedResponse, RequestKey};
