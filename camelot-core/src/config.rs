use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::CamelotError;

#[derive(Debug, Deserialize, Clone)]
pub struct CamelotConfig {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

/// Where the camera backend lives.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub events_interval_ms: u64,
    /// Cameras and entities refresh together on this cadence.
    pub fleet_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            events_interval_ms: 2000,
            fleet_interval_ms: 5000,
        }
    }
}

impl PollingConfig {
    pub fn events_interval(&self) -> Duration {
        Duration::from_millis(self.events_interval_ms.max(1))
    }

    pub fn fleet_interval(&self) -> Duration {
        Duration::from_millis(self.fleet_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl CamelotConfig {
    /// Load from a TOML file, then apply `CAMELOT__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CAMELOT").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Checks that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), CamelotError> {
        let url = &self.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CamelotError::InvalidConfig(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.backend.timeout_seconds == 0 {
            return Err(CamelotError::InvalidConfig(
                "backend.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.polling.events_interval_ms == 0 || self.polling.fleet_interval_ms == 0 {
            return Err(CamelotError::InvalidConfig(
                "polling intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
