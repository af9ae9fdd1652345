//! Core traits and types for the response store.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};
use crate::network::{Request, Response};

/// Identity of a cached request: method plus URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  pub method: String,
  pub url: String,
}

impl RequestKey {
  /// Build the key for a request. Only GET requests have one.
  pub fn for_request(request: &Request) -> Result<Self> {
    if !request.is_get() {
      return Err(CacheError::UnsupportedMethod {
        method: request.method.to_string(),
      });
    }

    let mut url = request.url.clone();
    url.set_fragment(None);

    Ok(Self {
      method: request.method.to_string(),
      url: url.into(),
    })
  }

  /// Stable, fixed-length hash used as the storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response read back from a cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// When the response was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for durable store backends.
///
/// A backend holds any number of named caches. Each cache maps request keys
/// to response snapshots. The backend also persists which cache name is the
/// current generation.
pub trait CacheStorage: Send + Sync {
  /// Create the named cache if absent. Returns true if it was created.
  fn open(&self, name: &str) -> Result<bool>;

  fn exists(&self, name: &str) -> Result<bool>;

  /// All cache names, oldest first.
  fn names(&self) -> Result<Vec<String>>;

  /// Delete a cache and all its entries. Returns false if it did not exist.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Write a single entry into an existing cache, replacing any previous
  /// entry for the key. Returns false without writing if the cache is gone.
  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<bool>;

  /// Write all entries in one transaction, creating the cache if absent.
  /// Either every entry lands or none do.
  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  fn lookup(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  fn entry_count(&self, name: &str) -> Result<usize>;

  /// The persisted current generation name, if any generation was promoted.
  fn current_generation(&self) -> Result<Option<String>>;

  fn set_current_generation(&self, name: &str) -> Result<()>;
}
