//! Named-cache handles over a storage backend.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::network::{Fetch, Request, Response};

use super::traits::{CacheStorage, CachedResponse, RequestKey};

/// Entry point to a storage backend: opens, lists and deletes named caches.
pub struct CacheStore<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheStore<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Open the named cache, creating it if absent.
  pub fn open(&self, name: &str) -> Result<Cache<S>> {
    if self.storage.open(name)? {
      debug!(cache = name, "created cache");
    }
    Ok(self.handle(name))
  }

  /// Open the named cache only if it already exists.
  pub fn get(&self, name: &str) -> Result<Option<Cache<S>>> {
    if self.storage.exists(name)? {
      Ok(Some(self.handle(name)))
    } else {
      Ok(None)
    }
  }

  pub fn names(&self) -> Result<Vec<String>> {
    self.storage.names()
  }

  /// Delete a cache by name. Returns false if there was nothing to delete.
  pub fn delete(&self, name: &str) -> Result<bool> {
    self.storage.delete(name)
  }

  pub fn entry_count(&self, name: &str) -> Result<usize> {
    self.storage.entry_count(name)
  }

  /// Name of the persisted current generation.
  pub fn current_generation(&self) -> Result<Option<String>> {
    self.storage.current_generation()
  }

  pub fn set_current_generation(&self, name: &str) -> Result<()> {
    self.storage.set_current_generation(name)
  }

  fn handle(&self, name: &str) -> Cache<S> {
    Cache {
      storage: Arc::clone(&self.storage),
      name: name.to_string(),
    }
  }
}

impl<S: CacheStorage> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

/// A handle to one named cache.
#[derive(Debug)]
pub struct Cache<S: CacheStorage> {
  storage: Arc<S>,
  name: String,
}

impl<S: CacheStorage> Cache<S> {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Store a response for a GET request. Only status 200 is accepted.
  ///
  /// Returns false if the cache has been deleted since this handle was
  /// opened; nothing is written then.
  pub fn put(&self, request: &Request, response: &Response) -> Result<bool> {
    let key = RequestKey::for_request(request)?;
    ensure_storable(&key, response)?;
    self.storage.put(&self.name, &key, response)
  }

  /// Store a batch of responses atomically.
  pub fn put_all(&self, entries: &[(Request, Response)]) -> Result<()> {
    let entries = entries
      .iter()
      .map(|(request, response)| {
        let key = RequestKey::for_request(request)?;
        ensure_storable(&key, response)?;
        Ok((key, response.clone()))
      })
      .collect::<Result<Vec<_>>>()?;

    self.storage.put_all(&self.name, &entries)
  }

  /// Fetch every request and store the results, or store nothing.
  ///
  /// Fails on the first request that cannot be fetched or does not come
  /// back with status 200.
  pub async fn add_all<F: Fetch>(&self, network: &F, requests: &[Request]) -> Result<()> {
    let fetches = requests.iter().map(|request| async move {
      let response = network.fetch(request).await?;
      if !response.is_storable() {
        return Err(CacheError::InvalidResponse {
          url: request.url.to_string(),
          status: response.status,
        });
      }
      Ok::<_, CacheError>((request.clone(), response))
    });

    let entries = try_join_all(fetches).await?;
    self.put_all(&entries)
  }

  /// Look up a request. Non-GET requests never match.
  pub fn lookup(&self, request: &Request) -> Result<Option<CachedResponse>> {
    match RequestKey::for_request(request) {
      Ok(key) => self.storage.lookup(&self.name, &key),
      Err(_) => Ok(None),
    }
  }

  pub fn len(&self) -> Result<usize> {
    self.storage.entry_count(&self.name)
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}

impl<S: CacheStorage> Clone for Cache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      name: self.name.clone(),
    }
  }
}

fn ensure_storable(key: &RequestKey, response: &Response) -> Result<()> {
  if response.is_storable() {
    Ok(())
  } else {
    Err(CacheError::InvalidResponse {
      url: key.url.clone(),
      status: response.status,
    })
  }
}
