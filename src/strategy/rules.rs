//! Strategy rules: ordered URL predicates mapped to a caching strategy.

use serde::Deserialize;
use std::fmt;
use url::Url;

/// Read/write policy applied to an intercepted request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
  /// Serve from the cache, fall back to the network on a miss
  #[default]
  CacheFirst,
  /// Prefer the network, fall back to the cache when offline
  NetworkFirst,
  /// Always go to the network, never touch the cache
  Bypass,
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::CacheFirst => "cache-first",
      Self::NetworkFirst => "network-first",
      Self::Bypass => "bypass",
    };
    f.write_str(name)
  }
}

/// Predicate over a parsed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
  /// Exact host match (case-insensitive)
  Host(String),
  /// The serialized URL starts with this string
  Prefix(String),
  /// The URL path starts with this string, on any host
  PathPrefix(String),
}

impl UrlPattern {
  pub fn matches(&self, url: &Url) -> bool {
    match self {
      Self::Host(host) => url
        .host_str()
        .is_some_and(|h| h.eq_ignore_ascii_case(host)),
      Self::Prefix(prefix) => url.as_str().starts_with(prefix.as_str()),
      Self::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRule")]
pub struct StrategyRule {
  pub pattern: UrlPattern,
  pub strategy: Strategy,
}

impl StrategyRule {
  pub fn new(pattern: UrlPattern, strategy: Strategy) -> Self {
    Self { pattern, strategy }
  }
}

/// Config form of a rule: exactly one matcher key plus a strategy.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
  host: Option<String>,
  prefix: Option<String>,
  path_prefix: Option<String>,
  strategy: Strategy,
}

impl TryFrom<RawRule> for StrategyRule {
  type Error = String;

  fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
    let pattern = match (raw.host, raw.prefix, raw.path_prefix) {
      (Some(host), None, None) => UrlPattern::Host(host),
      (None, Some(prefix), None) => UrlPattern::Prefix(prefix),
      (None, None, Some(path)) => UrlPattern::PathPrefix(path),
      _ => {
        return Err("a rule needs exactly one of host, prefix or path_prefix".to_string());
      }
    };
    Ok(Self::new(pattern, raw.strategy))
  }
}

/// Ordered rule list. First match wins; no match means `CacheFirst`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
  rules: Vec<StrategyRule>,
}

impl RuleTable {
  pub fn new(rules: Vec<StrategyRule>) -> Self {
    Self { rules }
  }

  /// Rules used when none are configured: document/API backend calls bypass
  /// the cache, everything else is cache-first.
  pub fn builtin() -> Self {
    Self::new(vec![
      StrategyRule::new(
        UrlPattern::Host("firestore.googleapis.com".to_string()),
        Strategy::Bypass,
      ),
      StrategyRule::new(
        UrlPattern::PathPrefix("/api/".to_string()),
        Strategy::Bypass,
      ),
    ])
  }

  pub fn rules(&self) -> &[StrategyRule] {
    &self.rules
  }

  pub fn resolve(&self, url: &Url) -> Strategy {
    self
      .rules
      .iter()
      .find(|rule| rule.pattern.matches(url))
      .map(|rule| rule.strategy)
      .unwrap_or_default()
  }

  /// True if any bypass rule matches, whatever its position in the table.
  /// Such URLs are never written to a cache.
  pub fn is_excluded(&self, url: &Url) -> bool {
    self
      .rules
      .iter()
      .any(|rule| rule.strategy == Strategy::Bypass && rule.pattern.matches(url))
  }
}
