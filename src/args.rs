use clap::Parser;
use std::path::PathBuf;

use camlink_relay::config::{self, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "camlink-relay")]
#[command(author = "Camlink Team")]
#[command(version)]
#[command(about = "Camera/viewer WebRTC signaling relay", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/camlink-relay.toml")]
    pub config: PathBuf,

    /// Relay bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Relay WebSocket port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// HTTP port for health/status/metrics
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Disable the HTTP status server
    #[arg(long, action)]
    pub no_http: bool,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, ConfigError> {
        config::Config::load(&self.config)
    }

    /// Apply command line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(ref host) = self.host {
            config.relay.host = host.clone();
        }
        if let Some(port) = self.port {
            config.relay.port = port;
        }
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if self.no_http {
            config.http.enabled = false;
        }
    }

    /// Log filter: `--verbose` wins, then the configured level
    pub fn log_filter(&self, config: &config::Config) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    }
}
