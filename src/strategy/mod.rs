//! Request-interception strategy engine.
//!
//! The dispatcher maps each GET request to one strategy via an ordered rule
//! table; executors then apply that strategy against the current cache.

mod dispatcher;
mod executor;
mod rules;

pub use dispatcher::{Dispatcher, Route};
pub use executor::{Outcome, Served, Source, StrategyExecutor};
pub use rules::{RuleTable, Strategy, StrategyRule, UrlPattern};
