//! Transport layer for the signaling relay
//!
//! Accepts WebSocket connections and runs one receive loop per connection.

pub mod peer;
pub mod signaling_server;
pub mod websocket;

pub use peer::{Peer, PeerHandle, PeerId, Role};
pub use signaling_server::handle_signaling_connection;
pub use websocket::RelayServer;
