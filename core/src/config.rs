//! Process-wide client configuration.
//!
//! Resolved once at startup from the environment and passed explicitly to
//! [`ItineraryClient::new`](crate::ItineraryClient::new). Nothing reconfigures
//! it afterwards.

use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryConfig;

pub const BASE_URL_VAR: &str = "ITINERARY_API_BASE_URL";
pub const TIMEOUT_MS_VAR: &str = "ITINERARY_API_TIMEOUT_MS";

pub const DEFAULT_BASE_URL: &str = "/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Prefix joined with every request path. May be relative (`/api`).
    pub base_url: String,
    /// Per physical attempt.
    pub timeout: Duration,
    /// Sent as `content-type` on every request.
    pub content_type: String,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Read `ITINERARY_API_BASE_URL` and `ITINERARY_API_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through `lookup`; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = match lookup(BASE_URL_VAR) {
            Some(url) => {
                let url = url.trim().trim_end_matches('/');
                if url.is_empty() {
                    return Err(ConfigError::EmptyBaseUrl);
                }
                if !is_usable_base(url) {
                    return Err(ConfigError::InvalidBaseUrl {
                        value: url.to_string(),
                    });
                }
                url.to_string()
            }
            None => DEFAULT_BASE_URL.to_string(),
        };

        let timeout = match lookup(TIMEOUT_MS_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ConfigError::InvalidTimeout { value: raw }),
            },
            None => Duration::from_millis(DEFAULT_TIMEOUT_MS),
        };

        Ok(Self {
            base_url,
            timeout,
            ..Self::default()
        })
    }

    /// Join the base URL with a request path.
    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

/// A base is either a path on the default origin or an absolute http(s) URL.
fn is_usable_base(url: &str) -> bool {
    if url.starts_with('/') {
        return true;
    }
    match reqwest::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, "/api");
        assert_eq!(config.timeout, Duration::from_millis(120_000));
        assert_eq!(config.content_type, "application/json");
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "http://127.0.0.1:8000/"),
            (TIMEOUT_MS_VAR, "5000"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[(BASE_URL_VAR, "  ")])),
            Err(ConfigError::EmptyBaseUrl)
        );
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(TIMEOUT_MS_VAR, "0")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(TIMEOUT_MS_VAR, "soon")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn rejects_base_that_cannot_resolve() {
        for base in ["api", "planner.example/api", "ftp://planner.example/api", "mailto:ops@planner.example"] {
            assert_eq!(
                ClientConfig::from_lookup(lookup(&[(BASE_URL_VAR, base)])),
                Err(ConfigError::InvalidBaseUrl {
                    value: base.to_string()
                }),
                "{base}"
            );
        }
        for base in ["/api", "https://planner.example/api"] {
            assert!(ClientConfig::from_lookup(lookup(&[(BASE_URL_VAR, base)])).is_ok(), "{base}");
        }
    }

    #[test]
    fn url_joining() {
        let config = ClientConfig::new("http://127.0.0.1:8000/");
        assert_eq!(config.url_for("/api/plan/42"), "http://127.0.0.1:8000/api/plan/42");
        assert_eq!(config.url_for("api/plan"), "http://127.0.0.1:8000/api/plan");
        assert_eq!(ClientConfig::default().url_for("/plan/1"), "/api/plan/1");
    }
}
