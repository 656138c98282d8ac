//! Connection and retry configuration.
//!
//! Configuration is read once at startup, typically from the environment:
//!
//! ```text
//! DOCREPO__ENDPOINT=mongodb://localhost:27017
//! DOCREPO__DATABASE=quickstart
//! DOCREPO__PAGE_SIZE=50
//! DOCREPO__RETRY__MAX_ATTEMPTS=5
//! ```

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{RepositoryError, RepositoryResult};

/// Settings for reaching the store and pacing queries against it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    /// Connection string or URL of the store.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Logical database the repositories operate in.
    #[serde(default = "default_database")]
    pub database: String,

    /// Account key or token, if the endpoint does not embed one.
    #[serde(default)]
    pub credentials: Option<String>,

    /// Maximum number of entities fetched per page by streaming queries.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Settings for retrying transient store faults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_endpoint() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "docrepo".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_jitter() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            database: default_database(),
            credentials: None,
            page_size: default_page_size(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl StoreConfig {
    pub const ENV_PREFIX: &'static str = "DOCREPO";

    /// Loads configuration from `DOCREPO__*` environment variables.
    pub fn from_env() -> RepositoryResult<Self> {
        Self::from_environment(Environment::with_prefix(Self::ENV_PREFIX).separator("__"))
    }

    /// Loads configuration from an environment source, then validates it.
    pub fn from_environment(environment: Environment) -> RepositoryResult<Self> {
        let config: StoreConfig = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> RepositoryResult<()> {
        if self.endpoint.is_empty() {
            return Err(RepositoryError::Initialization("endpoint must not be empty".into()));
        }
        if self.database.is_empty() {
            return Err(RepositoryError::Initialization("database must not be empty".into()));
        }
        if self.page_size == 0 {
            return Err(RepositoryError::Initialization("page_size must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RepositoryError::Initialization(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::{collections::HashMap, time::Duration};

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();

        Environment::with_prefix(StoreConfig::ENV_PREFIX)
            .separator("__")
            .source(Some(source))
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = StoreConfig::from_environment(environment(&[])).unwrap();

        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn nested_retry_settings_are_read() {
        let config = StoreConfig::from_environment(environment(&[
            ("DOCREPO__DATABASE", "quickstart"),
            ("DOCREPO__PAGE_SIZE", "25"),
            ("DOCREPO__RETRY__MAX_ATTEMPTS", "5"),
            ("DOCREPO__RETRY__JITTER", "false"),
        ]))
        .unwrap();

        assert_eq!(config.database, "quickstart");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.retry.max_attempts, 5);

        let policy = RetryPolicy::from(&config.retry);
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = StoreConfig::from_environment(environment(&[("DOCREPO__PAGE_SIZE", "0")]))
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Initialization(_)));
    }
}
