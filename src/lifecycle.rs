//! Worker lifecycle: install → activate → handle requests.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ClientRegistry;
use crate::error::Result;
use crate::generation::{CollectReport, Generation, GenerationManager};
use crate::network::{Fetch, Request};
use crate::store::{CacheStorage, CacheStore};
use crate::strategy::{Dispatcher, Outcome, Route, RuleTable, Strategy, StrategyExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Created, install not yet run
  New,
  Installing,
  /// Populated, waiting to activate
  Installed,
  Activating,
  Active,
  /// Install failed; this worker will never activate
  Redundant,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::New => "new",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Active => "active",
      Self::Redundant => "redundant",
    };
    f.write_str(name)
  }
}

/// Takeover policy for a freshly installed worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LifecyclePolicy {
  /// Activate right after install instead of waiting for clients of the
  /// previous generation to close
  #[serde(default = "default_true")]
  pub skip_waiting: bool,
  /// Take control of every open client on activation
  #[serde(default = "default_true")]
  pub claim_clients: bool,
}

fn default_true() -> bool {
  true
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self {
      skip_waiting: true,
      claim_clients: true,
    }
  }
}

/// What happened to an intercepted request.
#[derive(Debug, Clone)]
pub enum Interception {
  /// Not handled by the worker; the host sends it to the network as is
  PassThrough,
  Handled { strategy: Strategy, outcome: Outcome },
}

/// One instance of the interception layer, bound to one generation.
pub struct Worker<S: CacheStorage, F: Fetch> {
  generation: Generation,
  generations: GenerationManager<S, F>,
  dispatcher: Dispatcher,
  executor: StrategyExecutor<F>,
  clients: Arc<ClientRegistry>,
  policy: LifecyclePolicy,
  phase: Phase,
}

impl<S: CacheStorage, F: Fetch> Worker<S, F> {
  pub fn new(
    generation: Generation,
    store: CacheStore<S>,
    network: Arc<F>,
    rules: RuleTable,
    clients: Arc<ClientRegistry>,
    policy: LifecyclePolicy,
  ) -> Self {
    Self {
      generation,
      generations: GenerationManager::new(store, Arc::clone(&network)),
      dispatcher: Dispatcher::new(rules.clone()),
      executor: StrategyExecutor::new(network, rules),
      clients,
      policy,
      phase: Phase::New,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn generation(&self) -> &Generation {
    &self.generation
  }

  pub fn generations(&self) -> &GenerationManager<S, F> {
    &self.generations
  }

  /// Populate this worker's generation.
  ///
  /// On failure the worker becomes redundant and the previous generation
  /// keeps serving. On success the worker activates at once when
  /// `skip_waiting` is set, otherwise only if no client is still controlled
  /// by another generation.
  pub async fn install(&mut self) -> Result<Phase> {
    if self.phase != Phase::New {
      debug!(phase = %self.phase, "install already ran");
      return Ok(self.phase);
    }

    self.phase = Phase::Installing;
    info!(generation = self.generation.name(), "installing");

    if let Err(e) = self.generations.populate(&self.generation).await {
      warn!(error = %e, "install failed; previous generation stays active");
      self.phase = Phase::Redundant;
      return Err(e);
    }
    self.phase = Phase::Installed;

    if self.policy.skip_waiting {
      self.activate()?;
    } else {
      self.try_activate()?;
    }

    Ok(self.phase)
  }

  /// Pick up a generation that an earlier process already activated, without
  /// populating it again. Returns true if the worker is now active.
  pub fn resume(&mut self) -> Result<bool> {
    if self.phase != Phase::New {
      return Ok(self.phase == Phase::Active);
    }

    let name = self.generation.name();
    if self.generations.current_name()?.as_deref() != Some(name) {
      return Ok(false);
    }
    if self.generations.store().get(name)?.is_none() {
      return Ok(false);
    }

    self.phase = Phase::Active;
    info!(generation = name, "resumed active generation");
    Ok(true)
  }

  /// Activate a waiting worker once the previous generation has no clients
  /// left. Returns true if the worker is now active.
  pub fn try_activate(&mut self) -> Result<bool> {
    if self.phase != Phase::Installed {
      return Ok(self.phase == Phase::Active);
    }

    let waiting_on = self.clients.controlled_by_other(self.generation.name());
    if waiting_on > 0 {
      info!(
        generation = self.generation.name(),
        clients = waiting_on,
        "waiting for clients of the previous generation to close"
      );
      return Ok(false);
    }

    self.activate()?;
    Ok(true)
  }

  /// Promote the generation, collect stale generations, then claim clients.
  ///
  /// Does nothing unless the worker is installed.
  pub fn activate(&mut self) -> Result<CollectReport> {
    if self.phase != Phase::Installed {
      debug!(phase = %self.phase, "activate ignored");
      return Ok(CollectReport::default());
    }

    self.phase = Phase::Activating;
    let name = self.generation.name();
    info!(generation = name, "activating");

    if let Err(e) = self.generations.promote(&self.generation) {
      self.phase = Phase::Installed;
      return Err(e);
    }

    let report = self.generations.collect(name);

    if self.policy.claim_clients {
      let claimed = self.clients.claim_all(name);
      debug!(generation = name, claimed, "claimed clients");
    }

    self.phase = Phase::Active;
    info!(generation = name, "active");
    Ok(report)
  }

  /// Route one intercepted request.
  ///
  /// Only an active worker intercepts. Requests are served against whatever
  /// generation is current when they arrive.
  pub async fn handle(&self, request: &Request) -> Interception {
    if self.phase != Phase::Active {
      return Interception::PassThrough;
    }

    let strategy = match self.dispatcher.route(request) {
      Route::PassThrough => return Interception::PassThrough,
      Route::Intercept(strategy) => strategy,
    };

    let cache = match self.generations.current() {
      Ok(Some(cache)) => cache,
      Ok(None) => {
        warn!("no current generation; passing request through");
        return Interception::PassThrough;
      }
      Err(e) => {
        warn!(error = %e, "failed to read current generation; passing request through");
        return Interception::PassThrough;
      }
    };

    debug!(url = %request.url, %strategy, cache = cache.name(), "intercepted");
    let outcome = self.executor.execute(strategy, &cache, request).await;
    Interception::Handled { strategy, outcome }
  }
}
