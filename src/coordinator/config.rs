//! Router configuration
//!
//! Retry budgets and request sizing for union execution. Loaded from a
//! JSON file; every field has a default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{UnionError, UnionResult};
use crate::observability::{log_event_with_fields, Event, Severity};

/// Union execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Redispatches per shard after network errors (default: 3)
    #[serde(default = "default_max_network_retries")]
    pub max_network_retries: u32,

    /// Metadata refreshes after stale routing (default: 10)
    #[serde(default = "default_max_stale_retries")]
    pub max_stale_retries: u32,

    /// View rewrites per execution (default: 1)
    #[serde(default = "default_max_view_resolutions")]
    pub max_view_resolutions: u32,

    /// Documents per batch requested from shards; shard default when unset
    #[serde(default)]
    pub batch_size: Option<u32>,

    /// Minimum log severity (default: "INFO")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_network_retries() -> u32 {
    3
}

fn default_max_stale_retries() -> u32 {
    10
}

fn default_max_view_resolutions() -> u32 {
    1
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_network_retries: default_max_network_retries(),
            max_stale_retries: default_max_stale_retries(),
            max_view_resolutions: default_max_view_resolutions(),
            batch_size: None,
            log_level: default_log_level(),
        }
    }
}

impl RouterConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> UnionResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| UnionError::Config(format!("Failed to read config: {}", e)))?;

        let config: RouterConfig = serde_json::from_str(&content)
            .map_err(|e| UnionError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", &path.display().to_string())],
        );
        Ok(config)
    }

    pub fn validate(&self) -> UnionResult<()> {
        if self.batch_size == Some(0) {
            return Err(UnionError::Config("batch_size must be > 0".into()));
        }
        if self.severity().is_none() {
            return Err(UnionError::Config(format!(
                "Invalid log_level: '{}'",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Option<Severity> {
        Severity::parse(&self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: RouterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RouterConfig::default());
        assert_eq!(config.max_network_retries, 3);
        assert_eq!(config.max_stale_retries, 10);
        assert_eq!(config.max_view_resolutions, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_network_retries": 5, "batch_size": 101}}"#).unwrap();

        let config = RouterConfig::load(file.path()).unwrap();
        assert_eq!(config.max_network_retries, 5);
        assert_eq!(config.batch_size, Some(101));
        assert_eq!(config.max_stale_retries, 10);
    }

    #[test]
    fn test_rejects_zero_batch_and_bad_level() {
        let zero = RouterConfig {
            batch_size: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let bad_level = RouterConfig {
            log_level: "LOUD".into(),
            ..Default::default()
        };
        assert_eq!(bad_level.validate().unwrap_err().code(), "UNION_CONFIG_INVALID");
    }

    #[test]
    fn test_load_missing_file() {
        let err = RouterConfig::load(Path::new("/nonexistent/router.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
