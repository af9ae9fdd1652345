//! Strategy executors: cache-first, network-first and bypass.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::network::{Fetch, Request, Response};
use crate::store::{Cache, CacheStorage, CachedResponse};

use super::rules::{RuleTable, Strategy};

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  /// Live network response
  Network,
  /// Cache hit, network not consulted
  Cache,
  /// Network failed, serving the cached copy
  Offline,
}

/// A response handed back to the caller, with metadata about its source.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: Source,
  /// When the response was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl Served {
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: Source::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: Source::Cache,
      cached_at: Some(cached.cached_at),
    }
  }

  pub fn offline(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: Source::Offline,
      cached_at: Some(cached.cached_at),
    }
  }
}

/// Result of running a strategy.
#[derive(Debug, Clone)]
pub enum Outcome {
  Served(Served),
  /// No network and nothing cached
  Unavailable,
}

impl Outcome {
  pub fn response(&self) -> Option<&Response> {
    match self {
      Self::Served(served) => Some(&served.response),
      Self::Unavailable => None,
    }
  }

  pub fn source(&self) -> Option<Source> {
    match self {
      Self::Served(served) => Some(served.source),
      Self::Unavailable => None,
    }
  }

  pub fn is_unavailable(&self) -> bool {
    matches!(self, Self::Unavailable)
  }
}

/// Runs strategies against a cache and a network backend.
pub struct StrategyExecutor<F: Fetch> {
  network: Arc<F>,
  rules: RuleTable,
}

impl<F: Fetch> StrategyExecutor<F> {
  /// `rules` is only consulted for the storage exclusion check.
  pub fn new(network: Arc<F>, rules: RuleTable) -> Self {
    Self { network, rules }
  }

  pub async fn execute<S: CacheStorage>(
    &self,
    strategy: Strategy,
    cache: &Cache<S>,
    request: &Request,
  ) -> Outcome {
    match strategy {
      Strategy::CacheFirst => self.cache_first(cache, request).await,
      Strategy::NetworkFirst => self.network_first(cache, request).await,
      Strategy::Bypass => self.bypass(request).await,
    }
  }

  /// 1. Check cache - on a hit, return immediately
  /// 2. On a miss, fetch from network and store a copy if eligible
  /// 3. On network failure, the request is unavailable
  pub async fn cache_first<S: CacheStorage>(&self, cache: &Cache<S>, request: &Request) -> Outcome {
    if let Some(cached) = lookup(cache, request) {
      debug!(url = %request.url, "cache hit");
      return Outcome::Served(Served::from_cache(cached));
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        self.store_if_eligible(cache, request, &response);
        Outcome::Served(Served::from_network(response))
      }
      Err(e) => {
        info!(url = %request.url, error = %e, "fetch failed and nothing cached; running offline");
        Outcome::Unavailable
      }
    }
  }

  /// 1. Fetch from network - on success, store a copy if eligible
  /// 2. On network failure, fall back to the cache
  /// 3. Nothing cached either: unavailable
  pub async fn network_first<S: CacheStorage>(
    &self,
    cache: &Cache<S>,
    request: &Request,
  ) -> Outcome {
    match self.network.fetch(request).await {
      Ok(response) => {
        self.store_if_eligible(cache, request, &response);
        Outcome::Served(Served::from_network(response))
      }
      Err(e) => match lookup(cache, request) {
        Some(cached) => {
          info!(url = %request.url, error = %e, "fetch failed; serving cached copy");
          Outcome::Served(Served::offline(cached))
        }
        None => {
          info!(url = %request.url, error = %e, "fetch failed and nothing cached; running offline");
          Outcome::Unavailable
        }
      },
    }
  }

  /// Plain network fetch. The cache is never read or written.
  pub async fn bypass(&self, request: &Request) -> Outcome {
    match self.network.fetch(request).await {
      Ok(response) => Outcome::Served(Served::from_network(response)),
      Err(e) => {
        info!(url = %request.url, error = %e, "bypassed fetch failed");
        Outcome::Unavailable
      }
    }
  }

  /// Write a copy of `response` unless it is non-200 or the URL is excluded.
  /// A failed write is logged; the caller still gets the response.
  fn store_if_eligible<S: CacheStorage>(
    &self,
    cache: &Cache<S>,
    request: &Request,
    response: &Response,
  ) {
    if !response.is_storable() {
      debug!(url = %request.url, status = response.status, "not caching non-200 response");
      return;
    }
    if self.rules.is_excluded(&request.url) {
      debug!(url = %request.url, "not caching excluded URL");
      return;
    }

    match cache.put(request, response) {
      Ok(true) => {}
      Ok(false) => {
        debug!(url = %request.url, cache = cache.name(), "cache was collected; response not stored");
      }
      Err(e) => {
        warn!(url = %request.url, cache = cache.name(), error = %e, "failed to cache response");
      }
    }
  }
}

/// Cache lookup where a storage failure counts as a miss.
fn lookup<S: CacheStorage>(cache: &Cache<S>, request: &Request) -> Option<CachedResponse> {
  match cache.lookup(request) {
    Ok(found) => found,
    Err(e) => {
      warn!(url = %request.url, cache = cache.name(), error = %e, "cache lookup failed");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{CacheStore, SqliteStorage};
  use crate::strategy::rules::{StrategyRule, UrlPattern};
  use crate::testing::MockNetwork;
  use url::Url;

  const APP: &str = "https://example.com/app.js";
  const API: &str = "https://example.com/api/assets";
  const CSS: &str = "https://cdn.example.net/style.css";

  struct Fixture {
    network: Arc<MockNetwork>,
    executor: StrategyExecutor<MockNetwork>,
    cache: Cache<SqliteStorage>,
  }

  fn fixture() -> Fixture {
    let network = Arc::new(MockNetwork::new());
    let executor = StrategyExecutor::new(Arc::clone(&network), RuleTable::builtin());
    let store = CacheStore::new(SqliteStorage::open_in_memory().unwrap());
    let cache = store.open("shell-v1").unwrap();
    Fixture {
      network,
      executor,
      cache,
    }
  }

  fn get(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
  }

  fn body(outcome: &Outcome) -> &[u8] {
    &outcome.response().unwrap().body
  }

  #[tokio::test]
  async fn test_cache_first_hit_skips_network() {
    let f = fixture();
    let request = get(APP);
    f.cache
      .put(&request, &Response::new(APP, 200, "cached"))
      .unwrap();
    f.network.respond(APP, 200, "fresh");

    let outcome = f.executor.cache_first(&f.cache, &request).await;

    assert_eq!(outcome.source(), Some(Source::Cache));
    assert_eq!(body(&outcome), b"cached");
    assert_eq!(f.network.calls_to(APP), 0);
  }

  #[tokio::test]
  async fn test_cache_first_miss_fetches_and_stores() {
    let f = fixture();
    let request = get(APP);
    f.network.respond(APP, 200, "fresh");

    let outcome = f.executor.cache_first(&f.cache, &request).await;
    assert_eq!(outcome.source(), Some(Source::Network));
    assert_eq!(body(&outcome), b"fresh");

    // Second request is served from the stored copy
    let outcome = f.executor.cache_first(&f.cache, &request).await;
    assert_eq!(outcome.source(), Some(Source::Cache));
    assert_eq!(body(&outcome), b"fresh");
    assert_eq!(f.network.calls_to(APP), 1);
  }

  #[tokio::test]
  async fn test_cache_first_returns_but_skips_non_200() {
    let f = fixture();
    let request = get("https://example.com/missing.png");

    let outcome = f.executor.cache_first(&f.cache, &request).await;

    assert_eq!(outcome.response().unwrap().status, 404);
    assert!(f.cache.lookup(&request).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_cache_first_offline_miss_is_unavailable() {
    let f = fixture();
    f.network.set_offline(true);

    let outcome = f.executor.cache_first(&f.cache, &get(APP)).await;
    assert!(outcome.is_unavailable());
  }

  #[tokio::test]
  async fn test_cache_first_never_stores_excluded() {
    let f = fixture();
    let request = get(API);
    f.network.respond(API, 200, "[]");

    let outcome = f.executor.cache_first(&f.cache, &request).await;

    assert_eq!(body(&outcome), b"[]");
    assert!(f.cache.is_empty().unwrap());
  }

  #[tokio::test]
  async fn test_network_first_overwrites_stored_entry() {
    let f = fixture();
    let request = get(CSS);
    f.cache
      .put(&request, &Response::new(CSS, 200, "old"))
      .unwrap();
    f.network.respond(CSS, 200, "new");

    let outcome = f.executor.network_first(&f.cache, &request).await;

    assert_eq!(outcome.source(), Some(Source::Network));
    assert_eq!(body(&outcome), b"new");
    let stored = f.cache.lookup(&request).unwrap().unwrap();
    assert_eq!(stored.response.body, b"new");
  }

  #[tokio::test]
  async fn test_network_first_falls_back_when_offline() {
    let f = fixture();
    let request = get(CSS);
    f.cache
      .put(&request, &Response::new(CSS, 200, "old"))
      .unwrap();
    f.network.set_offline(true);

    let outcome = f.executor.network_first(&f.cache, &request).await;

    assert_eq!(outcome.source(), Some(Source::Offline));
    assert_eq!(body(&outcome), b"old");
  }

  #[tokio::test]
  async fn test_network_first_offline_miss_is_unavailable() {
    let f = fixture();
    f.network.set_offline(true);

    let outcome = f.executor.network_first(&f.cache, &get(CSS)).await;
    assert!(outcome.is_unavailable());
  }

  #[tokio::test]
  async fn test_network_first_error_status_keeps_old_entry() {
    let f = fixture();
    let request = get(CSS);
    f.cache
      .put(&request, &Response::new(CSS, 200, "old"))
      .unwrap();
    f.network.respond(CSS, 503, "unavailable");

    let outcome = f.executor.network_first(&f.cache, &request).await;

    assert_eq!(outcome.response().unwrap().status, 503);
    let stored = f.cache.lookup(&request).unwrap().unwrap();
    assert_eq!(stored.response.body, b"old");
  }

  #[tokio::test]
  async fn test_network_first_never_stores_excluded() {
    let network = Arc::new(MockNetwork::new());
    let rules = RuleTable::new(vec![
      StrategyRule::new(
        UrlPattern::Host("example.com".to_string()),
        Strategy::NetworkFirst,
      ),
      StrategyRule::new(UrlPattern::PathPrefix("/api/".to_string()), Strategy::Bypass),
    ]);
    let executor = StrategyExecutor::new(Arc::clone(&network), rules.clone());
    let cache = CacheStore::new(SqliteStorage::open_in_memory().unwrap())
      .open("shell-v1")
      .unwrap();
    network.respond(API, 200, "[]");

    let request = get(API);
    let strategy = rules.resolve(&request.url);
    assert_eq!(strategy, Strategy::NetworkFirst);

    executor.execute(strategy, &cache, &request).await;
    assert!(cache.is_empty().unwrap());
  }

  #[tokio::test]
  async fn test_bypass_never_reads_cache() {
    let f = fixture();
    let request = get(API);
    f.cache
      .put(&request, &Response::new(API, 200, "stale"))
      .unwrap();
    f.network.respond(API, 200, "live");

    let outcome = f.executor.bypass(&request).await;

    assert_eq!(outcome.source(), Some(Source::Network));
    assert_eq!(body(&outcome), b"live");
    assert_eq!(f.network.calls_to(API), 1);
  }

  #[tokio::test]
  async fn test_bypass_offline_is_unavailable() {
    let f = fixture();
    f.network.set_offline(true);

    let outcome = f.executor.execute(Strategy::Bypass, &f.cache, &get(API)).await;
    assert!(outcome.is_unavailable());
    assert!(f.cache.is_empty().unwrap());
  }
}
