use crate::error::ClientError;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "CLM_API_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh/";
pub const DEFAULT_FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(15);

pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connection settings for a [`crate::SessionClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub refresh_path: String,
    pub user_agent: String,
    pub fallback_poll_interval: Duration,
    /// Serialise concurrent refreshes behind one in-flight attempt.
    pub single_flight_refresh: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            user_agent: format!("clm-session/{}", env!("CARGO_PKG_VERSION")),
            fallback_poll_interval: DEFAULT_FALLBACK_POLL_INTERVAL,
            single_flight_refresh: false,
        }
    }

    /// Reads the base URL from `CLM_API_BASE_URL`, falling back to the local backend.
    pub fn from_env() -> Self {
        match std::env::var(ENV_BASE_URL) {
            Ok(value) if !value.trim().is_empty() => Self::new(value),
            _ => Self::default(),
        }
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim().trim_end_matches('/');
        self.api_prefix = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_fallback_poll_interval(mut self, interval: Duration) -> Self {
        self.fallback_poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_single_flight_refresh(mut self, enabled: bool) -> Self {
        self.single_flight_refresh = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let lower = self.base_url.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Absolute URL for a path relative to the backend root (`/api/auth/...`).
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Backend-root path for a versioned resource (`contracts/` -> `/api/v1/contracts/`).
    pub fn api_path(&self, resource: &str) -> String {
        format!("{}/{}", self.api_prefix, resource.trim_start_matches('/'))
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed_and_joined() {
        let config = ClientConfig::new(" http://api.example.test/ ");
        assert_eq!(config.base_url, "http://api.example.test");
        assert_eq!(
            config.url("/api/auth/login/"),
            "http://api.example.test/api/auth/login/"
        );
        assert_eq!(config.api_path("contracts/"), "/api/v1/contracts/");
        assert_eq!(config.api_path("/contracts/"), "/api/v1/contracts/");
    }

    #[test]
    fn api_prefix_gets_a_leading_slash() {
        let config = ClientConfig::default().with_api_prefix("api/v2/");
        assert_eq!(config.api_path("templates/"), "/api/v2/templates/");
    }

    #[test]
    fn poll_interval_is_clamped() {
        let config = ClientConfig::default().with_fallback_poll_interval(Duration::from_millis(10));
        assert_eq!(config.fallback_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn validate_rejects_non_http_urls() {
        assert!(ClientConfig::new("ftp://x").validate().is_err());
        assert!(ClientConfig::new("https://x").validate().is_ok());
    }
}
