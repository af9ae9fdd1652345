use color_eyre::{
  eyre::{eyre, WrapErr},
  Result,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::generation::Generation;
use crate::lifecycle::LifecyclePolicy;
use crate::strategy::{RuleTable, StrategyRule};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub cache: CacheConfig,
  /// Origin that relative manifest entries and request paths resolve against
  pub base_url: Url,
  /// Resources pre-populated into every new generation, in order
  #[serde(default)]
  pub manifest: Vec<String>,
  /// Strategy rules in priority order (built-in rules when omitted)
  pub rules: Option<Vec<StrategyRule>>,
  #[serde(default)]
  pub lifecycle: LifecyclePolicy,
  #[serde(default)]
  pub network: NetworkConfig,
  /// SQLite database path (default: $XDG_DATA_HOME/shellcache/cache.db)
  pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Generation name prefix, e.g. "asset-tracker-cache"
  pub prefix: String,
  /// Bumped to roll out a new generation, e.g. "v2"
  pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
  30
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      user_agent: None,
    }
  }
}

impl Config {
  /// Load configuration from `explicit_path`, or from the first existing
  /// file among [`Config::search_paths`].
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) if p.exists() => p.to_path_buf(),
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => {
        let candidates = Self::search_paths();
        match candidates.iter().find(|p| p.exists()) {
          Some(p) => p.clone(),
          None => {
            let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            return Err(eyre!("No config file found (tried {})", tried.join(", ")));
          }
        }
      }
    };

    let contents = std::fs::read_to_string(&path)
      .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
    Self::parse(&contents).wrap_err_with(|| format!("Invalid config file {}", path.display()))
  }

  /// `./shellcache.yaml`, then `$XDG_CONFIG_HOME/shellcache/config.yaml`.
  pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("shellcache.yaml")];
    if let Some(dir) = dirs::config_dir() {
      paths.push(dir.join("shellcache").join("config.yaml"));
    }
    paths
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.cache.prefix.trim().is_empty() || config.cache.version.trim().is_empty() {
      return Err(eyre!("cache.prefix and cache.version must not be empty"));
    }

    Ok(config)
  }

  pub fn generation_name(&self) -> String {
    Generation::versioned_name(&self.cache.prefix, &self.cache.version)
  }

  /// The generation described by this config, manifest resolved against
  /// `base_url`.
  pub fn generation(&self) -> Result<Generation> {
    Ok(Generation::resolve(
      self.generation_name(),
      &self.base_url,
      &self.manifest,
    )?)
  }

  pub fn rule_table(&self) -> RuleTable {
    match &self.rules {
      Some(rules) => RuleTable::new(rules.clone()),
      None => RuleTable::builtin(),
    }
  }

  /// Resolve a request target given on the command line.
  pub fn resolve_url(&self, input: &str) -> Result<Url> {
    self
      .base_url
      .join(input)
      .map_err(|e| eyre!("Invalid URL {}: {}", input, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::strategy::Strategy;

  const MINIMAL: &str = "\
cache:
  prefix: asset-tracker-cache
  version: v1
base_url: https://assets.example.com/
";

  #[test]
  fn test_minimal_config_defaults() {
    let config = Config::parse(MINIMAL).unwrap();

    assert_eq!(config.generation_name(), "asset-tracker-cache-v1");
    assert!(config.manifest.is_empty());
    assert_eq!(config.rule_table(), RuleTable::builtin());
    assert_eq!(config.lifecycle, LifecyclePolicy::default());
    assert_eq!(config.network.timeout_secs, 30);
    assert!(config.database.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = "\
cache:
  prefix: shell
  version: v7
base_url: https://assets.example.com/
manifest:
  - /
  - app.js
  - https://cdn.jsdelivr.net/npm/chart.js
rules:
  - prefix: https://cdn.tailwindcss.com
    strategy: network_first
  - path_prefix: /api/
    strategy: bypass
lifecycle:
  skip_waiting: false
network:
  timeout_secs: 5
  user_agent: shellcache-test
database: /tmp/shellcache-test.db
";
    let config = Config::parse(yaml).unwrap();

    let generation = config.generation().unwrap();
    assert_eq!(generation.name(), "shell-v7");
    assert_eq!(
      generation.manifest()[1].as_str(),
      "https://assets.example.com/app.js"
    );

    let rules = config.rule_table();
    assert_eq!(rules.rules().len(), 2);
    assert_eq!(
      rules.resolve(&Url::parse("https://cdn.tailwindcss.com/").unwrap()),
      Strategy::NetworkFirst
    );

    assert!(!config.lifecycle.skip_waiting);
    assert!(config.lifecycle.claim_clients);
    assert_eq!(config.network.timeout_secs, 5);
    assert_eq!(config.network.user_agent.as_deref(), Some("shellcache-test"));
  }

  #[test]
  fn test_empty_version_rejected() {
    let yaml = MINIMAL.replace("version: v1", "version: \"\"");
    assert!(Config::parse(&yaml).is_err());
  }

  #[test]
  fn test_resolve_url() {
    let config = Config::parse(MINIMAL).unwrap();
    assert_eq!(
      config.resolve_url("style.css").unwrap().as_str(),
      "https://assets.example.com/style.css"
    );
    assert_eq!(
      config.resolve_url("https://other.org/x").unwrap().as_str(),
      "https://other.org/x"
    );
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/shellcache.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_search_paths_prefer_working_directory() {
    let paths = Config::search_paths();
    assert_eq!(paths[0], PathBuf::from("shellcache.yaml"));
    assert!(paths[1..].iter().all(|p| p.ends_with("shellcache/config.yaml")));
  }

  #[test]
  fn test_load_reports_invalid_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("shellcache.yaml");
    std::fs::write(&path, MINIMAL.replace("version: v1", "version: \"\"")).unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("must not be empty"));
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("shellcache.yaml");
    std::fs::write(&path, MINIMAL).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.cache.prefix, "asset-tracker-cache");
  }
}
