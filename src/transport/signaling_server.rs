//! Per-connection signaling loop
//!
//! Each accepted connection gets:
//! 1. A writer task draining the connection's outbound queue
//! 2. A receive loop handing text frames to the router
//!
//! When either side stops (remote close, read error, failed write) the
//! registry cleanup for the connection's role runs exactly here.

use crate::transport::peer::Peer;
use crate::web::shared::SharedState;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, protocol::Message};

/// Handle a signaling WebSocket connection until it closes
pub async fn handle_signaling_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<SharedState>,
) -> Result<(), tungstenite::Error> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    debug!("WebSocket handshake completed for {}", addr);

    let (write, mut read) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let mut writer_handle = tokio::spawn(async move {
        let mut write = write;
        while let Some(msg) = outbound_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    let peer = Arc::new(Peer::new(Some(addr), outbound_tx));
    state.metrics.connection_opened();
    info!("Connection {} opened for {}", peer.id(), addr);

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let outcome = state.router.route_text(&peer, &text);
                    debug!("{} -> {:?}", peer.id(), outcome);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring {} byte binary frame from {}", data.len(), peer.id());
                }
                // Keep reading so tungstenite can flush the close reply; the
                // stream ends right after.
                Some(Ok(Message::Close(frame))) => {
                    debug!("Close frame from {}: {:?}", peer.id(), frame);
                }
                None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error from {}: {}", addr, e);
                    break;
                }
            },
            _ = &mut writer_handle => {
                debug!("Writer for {} stopped", peer.id());
                break;
            }
        }
    }

    state.router.disconnect(&peer);
    state.metrics.connection_closed();
    info!("Connection {} ({}) closed as {}", peer.id(), addr, peer.role());

    writer_handle.abort();
    Ok(())
}
