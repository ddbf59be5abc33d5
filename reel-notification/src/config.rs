use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use reel_shared::errors::{AppError, AppResult};

/// Settings for one notification session.
///
/// Loaded from `REEL_NOTIFICATION__*` environment variables, e.g.
/// `REEL_NOTIFICATION__REFRESH_INTERVAL_SECS=15`.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_alert_buffer")]
    pub alert_buffer: usize,
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

fn default_api_base_url() -> String { "http://localhost:8080/api".into() }
fn default_refresh_interval_secs() -> u64 { 30 }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_page_size() -> u64 { 50 }
fn default_alert_buffer() -> usize { 64 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            alert_buffer: default_alert_buffer(),
            metrics_addr: None,
        }
    }
}

impl SyncConfig {
    pub fn load() -> AppResult<Self> {
        // Best-effort .env loading.
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("REEL_NOTIFICATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.refresh_interval_secs == 0 {
            return Err(AppError::invalid_config("refresh_interval_secs must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::invalid_config("request_timeout_secs must be positive"));
        }
        if self.page_size == 0 {
            return Err(AppError::invalid_config("page_size must be positive"));
        }
        if self.alert_buffer == 0 {
            return Err(AppError::invalid_config("alert_buffer must be positive"));
        }
        reqwest::Url::parse(&self.api_base_url).map_err(|e| {
            AppError::invalid_config(format!("invalid api_base_url '{}': {e}", self.api_base_url))
        })?;
        self.metrics_socket_addr()?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn metrics_socket_addr(&self) -> AppResult<Option<SocketAddr>> {
        match self.metrics_addr.as_deref().filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e| {
                AppError::invalid_config(format!("invalid metrics_addr '{raw}': {e}"))
            }),
        }
    }

    pub fn log_summary(&self) {
        info!(
            api_base_url = %self.api_base_url,
            authenticated = self.api_token.is_some(),
            refresh_interval_secs = self.refresh_interval_secs,
            request_timeout_secs = self.request_timeout_secs,
            page_size = self.page_size,
            metrics_addr = self.metrics_addr.as_deref().unwrap_or("(disabled)"),
            "notification sync configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        config.validate().unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert!(config.metrics_socket_addr().unwrap().is_none());
    }

    #[test]
    fn deserializes_with_partial_overrides() {
        let config: SyncConfig = config::Config::builder()
            .set_override("refresh_interval_secs", 5)
            .unwrap()
            .set_override("api_token", "tok_abc")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.refresh_interval_secs, 5);
        assert_eq!(config.api_token.as_deref(), Some("tok_abc"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
    }

    #[test]
    fn rejects_zero_interval_and_bad_urls() {
        let config = SyncConfig {
            refresh_interval_secs: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            api_base_url: "localhost without scheme".into(),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            alert_buffer: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn metrics_addr_parses() {
        let config = SyncConfig {
            metrics_addr: Some("127.0.0.1:9464".into()),
            ..SyncConfig::default()
        };
        assert_eq!(
            config.metrics_socket_addr().unwrap(),
            Some("127.0.0.1:9464".parse().unwrap())
        );

        let config = SyncConfig {
            metrics_addr: Some("port 9464".into()),
            ..SyncConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().error_code().code(), "E0002");
    }
}
