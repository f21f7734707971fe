//! Relay-side connection handle
//!
//! A `Peer` is the shared reference the registry keeps for a connection. It
//! carries the connection's role (set at most once) and the sending half of
//! the connection's outbound queue.

use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

/// Opaque connection identity
pub type PeerId = Uuid;

/// Shared reference to an open connection
pub type PeerHandle = Arc<Peer>;

/// Role of a connection, inferred from its first meaningful message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Unassigned,
    Camera,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unassigned => write!(f, "unassigned"),
            Role::Camera => write!(f, "camera"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

/// The connection's writer has gone away
#[derive(Debug, thiserror::Error)]
#[error("peer {0} is no longer reachable")]
pub struct PeerGone(pub PeerId);

pub struct Peer {
    id: PeerId,
    addr: Option<SocketAddr>,
    role: OnceLock<Role>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("role", &self.role())
            .finish()
    }
}

impl Peer {
    pub fn new(addr: Option<SocketAddr>, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr,
            role: OnceLock::new(),
            outbound,
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn role(&self) -> Role {
        self.role.get().copied().unwrap_or(Role::Unassigned)
    }

    /// Assign the connection's role. Returns false if a role was already set.
    pub fn assign_role(&self, role: Role) -> bool {
        if role == Role::Unassigned {
            return false;
        }
        self.role.set(role).is_ok()
    }

    /// Queue a text frame; never blocks
    pub fn send_text(&self, text: &str) -> Result<(), PeerGone> {
        self.outbound
            .send(Message::Text(text.to_string()))
            .map_err(|_| PeerGone(self.id))
    }

    /// Ask the writer to send a close frame and stop
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::peer;
    use super::*;

    #[test]
    fn role_is_assigned_once() {
        let (peer, _rx) = peer();
        assert_eq!(peer.role(), Role::Unassigned);
        assert!(!peer.assign_role(Role::Unassigned));
        assert!(peer.assign_role(Role::Camera));
        assert!(!peer.assign_role(Role::Viewer));
        assert!(!peer.assign_role(Role::Camera));
        assert_eq!(peer.role(), Role::Camera);
    }

    #[test]
    fn send_fails_once_writer_is_gone() {
        let (peer, rx) = peer();
        assert!(peer.send_text("hello").is_ok());
        drop(rx);
        assert!(!peer.is_open());
        assert!(peer.send_text("hello").is_err());
    }
}
