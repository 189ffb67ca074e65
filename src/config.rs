use crate::error::{FetchError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Tuning knobs for paginated fetches.
///
/// Every field has a default so a partial TOML table is valid:
///
/// ```toml
/// page_size = 50
/// max_attempts = 3
/// backoff_ms = 1000
/// request_timeout_secs = 30
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Records requested per page (`per_page` query parameter)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Total requests allowed for one page, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between a failed attempt and its retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Transport-level timeout for a single request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_page_size() -> u32 {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("tabula/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: FetchConfig =
            toml::from_str(raw).map_err(|e| FetchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FetchError::Config("page_size must be positive".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(FetchError::Config("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("tabula/"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FetchConfig::from_toml_str("page_size = 20\nbackoff_ms = 5\n").unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.backoff(), Duration::from_millis(5));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = FetchConfig::from_toml_str("max_attempts = 0").unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));

        let err = FetchConfig::from_toml_str("page_size = \"many\"").unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetch.toml");
        std::fs::write(&path, "request_timeout_secs = 5\n").unwrap();

        let config = FetchConfig::load(&path).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));

        assert!(FetchConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
