//! Cache generations: versioned, pre-populated snapshots of the store.

use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CacheError, Result};
use crate::network::{Fetch, Request};
use crate::store::{Cache, CacheStorage, CacheStore};

/// A named cache plus the manifest it is pre-populated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
  name: String,
  manifest: Vec<Url>,
}

impl Generation {
  pub fn new(name: impl Into<String>, manifest: Vec<Url>) -> Self {
    Self {
      name: name.into(),
      manifest,
    }
  }

  /// `{prefix}-{version}`, e.g. `asset-tracker-cache-v1`.
  pub fn versioned_name(prefix: &str, version: &str) -> String {
    format!("{}-{}", prefix, version)
  }

  /// Build a generation from manifest identifiers, resolving relative paths
  /// (`/`, `app.js`) against `base`. Absolute URLs are kept as they are.
  pub fn resolve(name: impl Into<String>, base: &Url, identifiers: &[String]) -> Result<Self> {
    let manifest = identifiers
      .iter()
      .map(|id| {
        base.join(id).map_err(|source| CacheError::InvalidUrl {
          input: id.clone(),
          source,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Self::new(name, manifest))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn manifest(&self) -> &[Url] {
    &self.manifest
  }
}

/// Outcome of sweeping non-current generations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
  pub deleted: Vec<String>,
  /// Names that could not be deleted, with the reason
  pub failed: Vec<(String, String)>,
}

/// Owns the current-generation pointer, populates new generations and
/// collects superseded ones.
pub struct GenerationManager<S: CacheStorage, F: Fetch> {
  store: CacheStore<S>,
  network: Arc<F>,
}

impl<S: CacheStorage, F: Fetch> GenerationManager<S, F> {
  pub fn new(store: CacheStore<S>, network: Arc<F>) -> Self {
    Self { store, network }
  }

  pub fn store(&self) -> &CacheStore<S> {
    &self.store
  }

  /// Name of the current generation, if one was ever promoted.
  pub fn current_name(&self) -> Result<Option<String>> {
    self.store.current_generation()
  }

  /// Handle to the current generation's cache.
  pub fn current(&self) -> Result<Option<Cache<S>>> {
    match self.current_name()? {
      Some(name) => self.store.get(&name),
      None => Ok(None),
    }
  }

  /// Fetch and store every manifest resource, all or nothing.
  ///
  /// On failure nothing is written, a cache created by this call is removed
  /// again, and the current generation is untouched.
  pub async fn populate(&self, generation: &Generation) -> Result<Cache<S>> {
    let name = generation.name();
    let existed = self.store.get(name)?.is_some();
    let cache = self.store.open(name)?;

    let requests: Vec<Request> = generation
      .manifest()
      .iter()
      .cloned()
      .map(Request::get)
      .collect();

    info!(generation = name, resources = requests.len(), "populating generation");

    if let Err(e) = cache.add_all(self.network.as_ref(), &requests).await {
      if !existed {
        if let Err(cleanup) = self.store.delete(name) {
          warn!(generation = name, error = %cleanup, "failed to remove unpopulated cache");
        }
      }

      let resource = match &e {
        CacheError::Network { url, .. } | CacheError::InvalidResponse { url, .. } => url.clone(),
        _ => String::new(),
      };
      return Err(CacheError::Populate {
        generation: name.to_string(),
        resource,
        reason: e.to_string(),
      });
    }

    info!(generation = name, "generation populated");
    Ok(cache)
  }

  /// Make `generation` the current one. It must have been populated.
  pub fn promote(&self, generation: &Generation) -> Result<()> {
    let name = generation.name();
    if self.store.get(name)?.is_none() {
      return Err(CacheError::UnknownGeneration {
        name: name.to_string(),
      });
    }

    self.store.set_current_generation(name)?;
    info!(generation = name, "generation promoted");
    Ok(())
  }

  /// Delete every cache whose name is not `current`.
  ///
  /// Individual failures are logged and reported, never propagated.
  pub fn collect(&self, current: &str) -> CollectReport {
    let mut report = CollectReport::default();

    let names = match self.store.names() {
      Ok(names) => names,
      Err(e) => {
        warn!(error = %e, "failed to list caches; nothing collected");
        return report;
      }
    };

    for name in names.into_iter().filter(|n| n != current) {
      match self.store.delete(&name) {
        Ok(_) => {
          debug!(cache = %name, "deleted stale generation");
          report.deleted.push(name);
        }
        Err(e) => {
          let failure = CacheError::Deletion {
            name: name.clone(),
            message: e.to_string(),
          };
          warn!(error = %failure, "stale generation not collected");
          report.failed.push((name, e.to_string()));
        }
      }
    }

    info!(
      kept = current,
      deleted = report.deleted.len(),
      failed = report.failed.len(),
      "collected stale generations"
    );
    report
  }
}
