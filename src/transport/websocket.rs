//! WebSocket relay server
//!
//! Binds the relay address and spawns a signaling connection handler for
//! every accepted TCP stream.

use crate::transport::signaling_server::handle_signaling_connection;
use crate::web::shared::SharedState;
use log::{debug, error, info};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{self, Duration};

/// Pause after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// WebSocket relay server
pub struct RelayServer {
    /// Bind address
    addr: String,
    /// Port
    port: u16,
    /// Shared state
    state: Arc<SharedState>,
}

impl RelayServer {
    /// Create a relay server listening on the configured relay address
    pub fn new(state: Arc<SharedState>) -> Self {
        Self {
            addr: state.config.relay.host.clone(),
            port: state.config.relay.port,
            state,
        }
    }

    /// Bind the listening socket. Failure here is fatal for the process.
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(format!("{}:{}", self.addr, self.port)).await?;
        info!("Signaling relay listening on ws://{}:{}", self.addr, self.port);
        Ok(listener)
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            info!("New client connected from {}", addr);

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }

            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_signaling_connection(stream, addr, state).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}
