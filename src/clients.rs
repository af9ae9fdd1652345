//! Registry of open application clients and the generation controlling each.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub type ClientId = u64;

#[derive(Debug, Default)]
struct Inner {
  next_id: ClientId,
  /// Client → name of the generation whose worker handles its requests
  clients: BTreeMap<ClientId, Option<String>>,
}

/// Open clients (tabs, windows, embedded views) of the host application.
#[derive(Debug, Default)]
pub struct ClientRegistry {
  inner: Mutex<Inner>,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // The map stays consistent even if a holder panicked
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Register a client, optionally already controlled by a generation.
  pub fn open(&self, controller: Option<&str>) -> ClientId {
    let mut inner = self.lock();
    inner.next_id += 1;
    let id = inner.next_id;
    inner.clients.insert(id, controller.map(String::from));
    id
  }

  /// Returns false if the client was not open.
  pub fn close(&self, id: ClientId) -> bool {
    self.lock().clients.remove(&id).is_some()
  }

  pub fn controller(&self, id: ClientId) -> Option<String> {
    self.lock().clients.get(&id).cloned().flatten()
  }

  pub fn len(&self) -> usize {
    self.lock().clients.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Clients still controlled by a generation other than `generation`.
  pub fn controlled_by_other(&self, generation: &str) -> usize {
    self
      .lock()
      .clients
      .values()
      .filter(|c| c.as_deref().is_some_and(|name| name != generation))
      .count()
  }

  /// Make `generation` the controller of every open client. Returns how many
  /// clients changed controller.
  pub fn claim_all(&self, generation: &str) -> usize {
    let mut inner = self.lock();
    let mut claimed = 0;
    for controller in inner.clients.values_mut() {
      if controller.as_deref() != Some(generation) {
        *controller = Some(generation.to_string());
        claimed += 1;
      }
    }
    claimed
  }
}
