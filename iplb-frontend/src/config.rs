//! Runtime configuration passed explicitly into the client and the sweeper.

use std::time::Duration;

use crate::retry::RetryConfig;

/// Default API root.
pub const DEFAULT_ENDPOINT: &str = "https://eu.api.ovh.com/1.0";

/// Display-name prefix marking frontends created by ephemeral test runs.
pub const DEFAULT_TEST_PREFIX: &str = "tf-test-";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`RestClient`](crate::client::RestClient).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    /// Bearer token; no auth header is sent when unset
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Scope and behaviour of a sweep run.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Service to sweep. `None` disables sweeping entirely.
    pub service: Option<String>,
    /// Only frontends whose display name starts with this are deleted
    pub prefix: String,
    /// Budget for each individual delete
    pub retry: RetryConfig,
    /// Walk every state but skip the delete calls
    pub dry_run: bool,
}

impl SweepConfig {
    pub fn new(service: Option<String>) -> Self {
        Self {
            service,
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            service: None,
            prefix: DEFAULT_TEST_PREFIX.to_string(),
            retry: RetryConfig::default(),
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_sweep_config_builders() {
        let config = SweepConfig::new(Some("lb-1".to_string()))
            .with_prefix("ci-")
            .dry_run(true);
        assert_eq!(config.service.as_deref(), Some("lb-1"));
        assert_eq!(config.prefix, "ci-");
        assert!(config.dry_run);
        assert_eq!(config.retry.budget, Duration::from_secs(300));
    }

    #[test]
    fn test_sweep_disabled_by_default() {
        let config = SweepConfig::default();
        assert!(config.service.is_none());
        assert_eq!(config.prefix, DEFAULT_TEST_PREFIX);
    }
}
