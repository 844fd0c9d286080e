//! Configuration for the HWR console
//!
//! Handles loading configuration from TOML files and environment variables.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportKind;

/// Environment variable overriding the training service endpoint
pub const ENV_CHANNEL_ENDPOINT: &str = "HWR_CHANNEL_ENDPOINT";
/// Environment variable overriding the session file location
pub const ENV_SESSION_FILE: &str = "HWR_SESSION_FILE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main console configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Training event channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Transports in order of preference
    #[serde(default = "default_transports")]
    pub transports: Vec<TransportKind>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub reconnection: ReconnectPolicy,
}

/// Automatic reconnection policy: fixed delay, bounded attempts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_reconnection_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reconnection_delay")]
    pub delay_ms: u64,
    /// Retries after the initial attempt
    #[serde(default = "default_reconnection_attempts")]
    pub max_attempts: u32,
}

/// Base URLs of the REST collaborators
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_api_url")]
    pub datasets_url: String,
    #[serde(default = "default_models_url")]
    pub models_url: String,
    #[serde(default = "default_logs_url")]
    pub logs_url: String,
    #[serde(default = "default_api_url")]
    pub training_api_url: String,
    #[serde(default = "default_endpoint")]
    pub training_service_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Local session storage
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Session file; `~/.hwr/session.json` when unset
    #[serde(default)]
    pub file: Option<String>,
}

// Default value functions
fn default_endpoint() -> String {
    "http://localhost:5897".to_string()
}
fn default_path() -> String {
    "/socket.io/".to_string()
}
fn default_transports() -> Vec<TransportKind> {
    vec![TransportKind::Websocket, TransportKind::Polling]
}
fn default_connect_timeout() -> u64 {
    20_000
}
fn default_reconnection_enabled() -> bool {
    true
}
fn default_reconnection_delay() -> u64 {
    1000
}
fn default_reconnection_attempts() -> u32 {
    5
}
fn default_auth_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_api_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_models_url() -> String {
    "http://localhost:8082/api".to_string()
}
fn default_logs_url() -> String {
    "http://localhost:8081/api".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            path: default_path(),
            transports: default_transports(),
            connect_timeout_ms: default_connect_timeout(),
            reconnection: ReconnectPolicy::default(),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: default_reconnection_enabled(),
            delay_ms: default_reconnection_delay(),
            max_attempts: default_reconnection_attempts(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            datasets_url: default_api_url(),
            models_url: default_models_url(),
            logs_url: default_logs_url(),
            training_api_url: default_api_url(),
            training_service_url: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl ChannelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Endpoint parsed as a URL
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("channel.endpoint '{}': {}", self.endpoint, e)))
    }
}

impl ServicesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ConsoleConfig {
    /// Load configuration from the default location (~/.hwr/config.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hwr")
    }

    /// Apply `HWR_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_CHANNEL_ENDPOINT) {
            if !endpoint.is_empty() {
                self.channel.endpoint = endpoint;
            }
        }
        if let Ok(file) = std::env::var(ENV_SESSION_FILE) {
            if !file.is_empty() {
                self.session.file = Some(file);
            }
        }
    }

    /// Get the session file path (expanded)
    pub fn session_file(&self) -> PathBuf {
        match &self.session.file {
            Some(file) => PathBuf::from(file.replace(
                "~",
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .to_str()
                    .unwrap_or("."),
            )),
            None => Self::home_dir().join("session.json"),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.channel.endpoint_url()?;

        if self.channel.transports.is_empty() {
            return Err(ConfigError::Invalid(
                "channel.transports must name at least one transport".to_string(),
            ));
        }

        if self.channel.reconnection.enabled && self.channel.reconnection.delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "channel.reconnection.delay_ms must be positive when reconnection is enabled"
                    .to_string(),
            ));
        }

        for (name, url) in [
            ("services.auth_url", &self.services.auth_url),
            ("services.datasets_url", &self.services.datasets_url),
            ("services.models_url", &self.services.models_url),
            ("services.logs_url", &self.services.logs_url),
            ("services.training_api_url", &self.services.training_api_url),
            ("services.training_service_url", &self.services.training_service_url),
        ] {
            Url::parse(url).map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", name, url, e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConsoleConfig::default();
        assert_eq!(config.channel.endpoint, "http://localhost:5897");
        assert_eq!(
            config.channel.transports,
            vec![TransportKind::Websocket, TransportKind::Polling]
        );
        assert_eq!(config.channel.reconnection.delay(), Duration::from_millis(1000));
        assert_eq!(config.channel.reconnection.max_attempts, 5);
        assert_eq!(config.services.models_url, "http://localhost:8082/api");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[channel]
endpoint = "http://trainer.internal:6000"
transports = ["polling"]

[channel.reconnection]
delay_ms = 250
max_attempts = 2

[services]
logs_url = "http://logs.internal/api"

[session]
file = "/tmp/hwr-session.json"
"#;
        let config: ConsoleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.channel.endpoint, "http://trainer.internal:6000");
        assert_eq!(config.channel.transports, vec![TransportKind::Polling]);
        assert_eq!(config.channel.path, "/socket.io/");
        assert_eq!(config.channel.reconnection.delay_ms, 250);
        assert!(config.channel.reconnection.enabled);
        assert_eq!(config.services.logs_url, "http://logs.internal/api");
        assert_eq!(config.services.auth_url, "http://localhost:8080/api");
        assert_eq!(config.session_file(), PathBuf::from("/tmp/hwr-session.json"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ConsoleConfig::default();
        config.channel.transports.clear();
        assert!(config.validate().is_err());

        let mut config = ConsoleConfig::default();
        config.channel.reconnection.delay_ms = 0;
        assert!(config.validate().is_err());
        config.channel.reconnection.enabled = false;
        assert!(config.validate().is_ok());

        let mut config = ConsoleConfig::default();
        config.channel.endpoint = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[channel]\nconnect_timeout_ms = 500\n").unwrap();

        let config = ConsoleConfig::load_from_path(&path).unwrap();
        assert_eq!(config.channel.connect_timeout(), Duration::from_millis(500));

        std::fs::write(&path, "[channel\n").unwrap();
        assert!(matches!(
            ConsoleConfig::load_from_path(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
