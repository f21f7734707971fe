//! Configuration management for camlink-relay

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signaling relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// HTTP status server configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Peer client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Relay WebSocket port
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Close a camera or viewer connection once a newer one replaces it
    #[serde(default = "default_close_superseded")]
    pub close_superseded: bool,

    /// Viewer candidates kept in the mailbox per offer while the camera is away
    #[serde(default = "default_max_cached_candidates")]
    pub max_cached_candidates: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_relay_port(),
            close_superseded: default_close_superseded(),
            max_cached_candidates: default_max_cached_candidates(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Serve /health, /status and /metrics
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,

    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            host: default_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay URL the camera/viewer clients connect to
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Delay between reconnect attempts, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Give up after this many consecutive failed attempts (unbounded if unset)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl ClientConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Validate the client section. Only peer clients read it, so the relay
    /// never calls this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.relay_url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(
                "Client relay_url must start with ws:// or wss://".into(),
            ));
        }

        if self.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid("Client retry delay must be non-zero".into()));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            retry_delay_secs: default_retry_delay_secs(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the relay and HTTP sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.host.trim().is_empty() {
            return Err(ConfigError::Invalid("Relay host must not be empty".into()));
        }

        if self.relay.port == 0 {
            return Err(ConfigError::Invalid("Relay port must be non-zero".into()));
        }

        if self.http.enabled {
            if self.http.host.trim().is_empty() {
                return Err(ConfigError::Invalid("HTTP host must not be empty".into()));
            }
            if self.http.port == 0 {
                return Err(ConfigError::Invalid("HTTP port must be non-zero".into()));
            }
            if self.http.port == self.relay.port && self.http.host == self.relay.host {
                return Err(ConfigError::Invalid(
                    "HTTP and relay servers cannot share an address".into(),
                ));
            }
        }

        if self.relay.max_cached_candidates == 0 {
            return Err(ConfigError::Invalid(
                "Relay max_cached_candidates must be non-zero".into(),
            ));
        }

        Ok(())
    }
}


fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_relay_port() -> u16 { 8765 }
fn default_http_port() -> u16 { 9090 }
fn default_close_superseded() -> bool { true }
fn default_max_cached_candidates() -> usize { crate::signaling::DEFAULT_CANDIDATE_LIMIT }
fn default_http_enabled() -> bool { true }
fn default_retry_delay_secs() -> u64 { 5 }

fn default_relay_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
