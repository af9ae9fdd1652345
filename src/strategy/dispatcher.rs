//! Routes intercepted requests to a strategy.

use crate::network::Request;

use super::rules::{RuleTable, Strategy};

/// Routing decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Not intercepted; the request goes out untouched
  PassThrough,
  Intercept(Strategy),
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
  rules: RuleTable,
}

impl Dispatcher {
  pub fn new(rules: RuleTable) -> Self {
    Self { rules }
  }

  pub fn rules(&self) -> &RuleTable {
    &self.rules
  }

  /// Non-GET requests pass through; everything else resolves to exactly one
  /// strategy.
  pub fn route(&self, request: &Request) -> Route {
    if !request.is_get() {
      return Route::PassThrough;
    }
    Route::Intercept(self.rules.resolve(&request.url))
  }
}
