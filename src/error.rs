//! Error types for the caching layer.
//!
//! Library code returns [`CacheError`]; the binary wraps it in
//! `color_eyre::Report` at the top level.

use thiserror::Error;

/// Errors produced by the store, the network backend and the lifecycle.
#[derive(Debug, Error)]
pub enum CacheError {
  /// A manifest resource could not be fetched while populating a generation.
  #[error("Failed to populate generation {generation}: {resource}: {reason}")]
  Populate {
    generation: String,
    resource: String,
    reason: String,
  },

  /// A stale generation could not be deleted.
  #[error("Failed to delete cache {name}: {message}")]
  Deletion { name: String, message: String },

  /// The network request failed (connectivity loss, DNS, TLS, timeout).
  #[error("Network request to {url} failed: {message}")]
  Network { url: String, message: String },

  /// The response status makes it ineligible for storage.
  #[error("{url} returned status {status}")]
  InvalidResponse { url: String, status: u16 },

  /// Only GET requests are ever read from or written to a cache.
  #[error("Request method {method} is not cacheable")]
  UnsupportedMethod { method: String },

  /// A generation was promoted before it was populated.
  #[error("Unknown generation: {name}")]
  UnknownGeneration { name: String },

  /// A manifest entry or request URL could not be parsed.
  #[error("Invalid URL {input}: {source}")]
  InvalidUrl {
    input: String,
    #[source]
    source: url::ParseError,
  },

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Invalid timestamp: {0}")]
  InvalidTimestamp(#[from] chrono::ParseError),

  #[error("Lock poisoned: {0}")]
  LockPoisoned(String),
}

impl CacheError {
  /// True for errors caused by the network being unreachable.
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network { .. })
  }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_populate_message_names_resource() {
    let err = CacheError::Populate {
      generation: "shell-v2".to_string(),
      resource: "https://example.com/app.js".to_string(),
      reason: "status 500".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("shell-v2"));
    assert!(msg.contains("app.js"));
    assert!(msg.contains("500"));
  }

  #[test]
  fn test_is_network() {
    let err = CacheError::Network {
      url: "https://example.com/".to_string(),
      message: "connection refused".to_string(),
    };
    assert!(err.is_network());

    let err = CacheError::InvalidResponse {
      url: "https://example.com/".to_string(),
      status: 404,
    };
    assert!(!err.is_network());
  }
}
