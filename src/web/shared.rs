//! Shared state for camlink-relay
//!
//! Ties together configuration, the connection registry, the router and
//! metrics so the relay and status servers see the same instances.

use crate::config::Config;
use crate::metrics::RelayMetrics;
use crate::signaling::{Registry, Router};
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state for the application
pub struct SharedState {
    /// Configuration
    pub config: Arc<Config>,

    /// Camera/viewer registry and mailbox
    pub registry: Arc<Registry>,

    /// Message router driving the registry
    pub router: Arc<Router>,

    /// Relay metrics
    pub metrics: Arc<RelayMetrics>,

    /// Server start time
    pub start_time: Instant,
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("config", &self.config)
            .field("mailbox", &self.registry.snapshot())
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl SharedState {
    /// Create a new shared state
    pub fn new(config: Config) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(RelayMetrics::new()?);
        let registry = Arc::new(Registry::with_candidate_limit(config.relay.max_cached_candidates));
        let router = Arc::new(Router::new(
            registry.clone(),
            metrics.clone(),
            config.relay.close_superseded,
        ));

        Ok(Self {
            config: Arc::new(config),
            registry,
            router,
            metrics,
            start_time: Instant::now(),
        })
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get open relay connection count
    pub fn connection_count(&self) -> u64 {
        self.metrics.open_connections().max(0) as u64
    }

    /// Shutdown the relay state
    pub fn shutdown(&self) {
        let snapshot = self.registry.snapshot();
        info!(
            "Shutting down relay (camera: {}, viewer: {}, cached offer: {})",
            snapshot.camera_connected, snapshot.viewer_connected, snapshot.offer_cached
        );
    }
}
