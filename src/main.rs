//! camlink-relay - Main entry point
//!
//! Runs the camera/viewer signaling relay and its HTTP status server.

mod args;

use args::Args;
use camlink_relay::config::Config;
use camlink_relay::transport::RelayServer;
use camlink_relay::web::{run_http_server, SharedState};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration before logging so the configured level applies
    let loaded = args.load_config();
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => Config::default(),
    };
    args.apply_overrides(&mut config);

    env_logger::Builder::new()
        .parse_filters(&std::env::var("CAMLINK_LOG").unwrap_or_else(|_| args.log_filter(&config)))
        .init();

    info!("camlink-relay v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => info!("Loaded configuration from {:?}", args.config),
        Err(e) => warn!("Failed to load config: {}, using defaults", e),
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let state = Arc::new(SharedState::new(config)?);

    // Bind first: a listen failure is fatal
    let server = RelayServer::new(state.clone());
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Failed to bind relay on {}:{}: {}",
                state.config.relay.host, state.config.relay.port, e
            );
            return Err(e.into());
        }
    };

    if state.config.http.enabled {
        let http_state = state.clone();
        let host = state.config.http.host.clone();
        let port = state.config.http.port;
        tokio::spawn(async move {
            if let Err(e) = run_http_server(&host, port, http_state).await {
                error!("HTTP status server failed: {}", e);
            }
        });
    }

    let shutdown = async {
        let _ = signal::ctrl_c().await;
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = shutdown => {
            info!("Initiating graceful shutdown...");
        }
        result = server.serve(listener) => {
            if let Err(e) = result {
                error!("Relay server stopped: {}", e);
            }
        }
    }

    state.shutdown();
    info!("camlink-relay stopped");
    Ok(())
}
