//! Network and storage doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{CacheError, Result};
use crate::network::{Fetch, Request, Response};
use crate::store::{CacheStorage, CachedResponse, RequestKey, SqliteStorage};

/// Responds from a table of URL → (status, body). Unknown URLs get a 404.
#[derive(Default)]
pub struct MockNetwork {
  routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
  calls: Mutex<Vec<String>>,
  offline: AtomicBool,
}

impl MockNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, status: u16, body: &str) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), (status, body.as_bytes().to_vec()));
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  /// Number of fetches issued for `url`, including failed ones.
  pub fn calls_to(&self, url: &str) -> usize {
    self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Fetch for MockNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = request.url.to_string();
    self.calls.lock().unwrap().push(url.clone());

    if self.offline.load(Ordering::SeqCst) {
      return Err(CacheError::Network {
        url,
        message: "offline".to_string(),
      });
    }

    let route = self.routes.lock().unwrap().get(&url).cloned();
    let (status, body) = route.unwrap_or((404, b"Not Found".to_vec()));
    Ok(Response::new(url, status, body))
  }
}

/// In-memory storage whose `delete` fails for one cache name.
pub struct FailingDelete {
  inner: SqliteStorage,
  fail_on: String,
}

impl FailingDelete {
  pub fn new(fail_on: &str) -> Self {
    Self {
      inner: SqliteStorage::open_in_memory().unwrap(),
      fail_on: fail_on.to_string(),
    }
  }
}

impl CacheStorage for FailingDelete {
  fn open(&self, name: &str) -> Result<bool> {
    CacheStorage::open(&self.inner, name)
  }

  fn exists(&self, name: &str) -> Result<bool> {
    self.inner.exists(name)
  }

  fn names(&self) -> Result<Vec<String>> {
    self.inner.names()
  }

  fn delete(&self, name: &str) -> Result<bool> {
    if name == self.fail_on {
      return Err(CacheError::Io(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "cache is locked",
      )));
    }
    self.inner.delete(name)
  }

  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<bool> {
    self.inner.put(name, key, response)
  }

  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    self.inner.put_all(name, entries)
  }

  fn lookup(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    self.inner.lookup(name, key)
  }

  fn entry_count(&self, name: &str) -> Result<usize> {
    self.inner.entry_count(name)
  }

  fn current_generation(&self) -> Result<Option<String>> {
    self.inner.current_generation()
  }

  fn set_current_generation(&self, name: &str) -> Result<()> {
    self.inner.set_current_generation(name)
  }
}
