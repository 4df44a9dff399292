//! Configuration management for the Bloom attempt limiter.
//!
//! Settings come from an optional YAML file overlaid with `BLOOM_*`
//! environment variables, e.g. `BLOOM_LIMITERS__AUTH__MAX_ATTEMPTS=10`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BloomError, Result};
use crate::ratelimit::LimitersConfig;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BLOOM";

/// Main configuration for the limiter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomConfig {
    /// Persistence configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-action attempt limits
    #[serde(default)]
    pub limiters: LimitersConfig,
}

/// Which store backs the limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process only; state is lost on exit
    Memory,
    /// JSON document on disk
    File,
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Path of the JSON document used by the file backend
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::File
}

fn default_store_path() -> PathBuf {
    PathBuf::from("bloom-limiter.json")
}

impl BloomConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: BloomConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| BloomError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: BloomConfig =
            serde_yaml::from_str(yaml).map_err(|e| BloomError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| BloomError::Config(e.to_string()))
    }

    /// Check every limiter rule.
    pub fn validate(&self) -> Result<()> {
        self.limiters.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BloomConfig::default();
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.store.path, PathBuf::from("bloom-limiter.json"));
        assert_eq!(config.limiters, LimitersConfig::default());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
store:
  backend: memory
limiters:
  auth:
    max_attempts: 10
    window_ms: 1000
"#;
        let config = BloomConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.limiters.auth.max_attempts, 10);
        assert_eq!(config.limiters.auth.window_ms, 1000);
        // Untouched limiter keeps its default
        assert_eq!(config.limiters.password_reset.max_attempts, 3);
    }

    #[test]
    fn test_partial_rule_in_yaml() {
        let config = BloomConfig::from_yaml("limiters:\n  auth: {max_attempts: 10}\n").unwrap();
        assert_eq!(config.limiters.auth.max_attempts, 10);
        assert_eq!(config.limiters.auth.window_ms, 300_000);
    }

    #[test]
    fn test_oversized_window_rejected() {
        let yaml = "limiters:\n  auth: {window_ms: 18446744073709551615}\n";
        assert!(matches!(
            BloomConfig::from_yaml(yaml),
            Err(BloomError::Config(_))
        ));
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
limiters:
  password_reset:
    max_attempts: 3
    window_ms: 0
"#;
        assert!(matches!(
            BloomConfig::from_yaml(yaml),
            Err(BloomError::Config(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip_of_effective_config() {
        let config = BloomConfig::default();
        let rendered = config.to_yaml().unwrap();
        assert!(rendered.contains("password_reset"));
        assert_eq!(BloomConfig::from_yaml(&rendered).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bloom.yaml");
        let yaml = r#"
store:
  backend: file
  path: /tmp/limits.json
limiters:
  auth:
    max_attempts: 7
"#;
        std::fs::write(&path, yaml).unwrap();

        let config = BloomConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/limits.json"));
        assert_eq!(config.limiters.auth.max_attempts, 7);
        assert_eq!(config.limiters.auth.window_ms, 300_000);
    }

    #[test]
    fn test_environment_overrides_single_rule_field() {
        // Only this test touches password_reset.max_attempts in the environment.
        let var = "BLOOM_LIMITERS__PASSWORD_RESET__MAX_ATTEMPTS";
        std::env::set_var(var, "9");
        let loaded = BloomConfig::load(None);
        std::env::remove_var(var);

        let config = loaded.unwrap();
        assert_eq!(config.limiters.password_reset.max_attempts, 9);
        assert_eq!(config.limiters.password_reset.window_ms, 600_000);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = BloomConfig::load(Some(&dir.path().join("absent.yaml")));
        assert!(matches!(result, Err(BloomError::Config(_))));
    }
}
