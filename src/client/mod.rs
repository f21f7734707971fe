//! Camera- and viewer-side relay clients
//!
//! The relay only works if both peers follow the same contract:
//! - The camera sends `camera_join` first on every (re)connection, answers
//!   every offer exactly once and reconnects forever with a fixed delay.
//! - The viewer sends one offer per connection, then its candidates, and
//!   waits for exactly one answer. A new connection is a new session.
//!
//! Media setup itself stays outside: the camera delegates answer creation to
//! an [`AnswerProvider`] and both sides hand remote candidates to a
//! [`CandidateSink`].

pub mod camera;
pub mod retry;
pub mod viewer;

pub use camera::CameraClient;
pub use retry::RetryPolicy;
pub use viewer::{ViewerEvent, ViewerSession};

use crate::signaling::{IceCandidate, SignalingError};
use std::future::Future;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Client side WebSocket stream
pub type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Peer client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Relay URL cannot be used; retrying will not help
    #[error("Invalid relay URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection level failure
    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Could not encode or decode a signaling message
    #[error("Protocol error: {0}")]
    Protocol(#[from] SignalingError),

    /// The relay closed the connection
    #[error("Connection closed by relay")]
    Closed,

    /// The viewer session already sent its offer
    #[error("Offer already sent for this session")]
    OfferAlreadySent,

    /// The answer provider could not answer an offer
    #[error("Answer provider failed: {0}")]
    Answer(String),

    /// Retry policy exhausted
    #[error("Gave up after {0} failed attempts")]
    RetriesExhausted(u32),
}

impl ClientError {
    /// Transient errors are worth a reconnect; the rest are configuration
    /// or programming errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(tungstenite::Error::Url(_)) => false,
            ClientError::Transport(_) | ClientError::Closed | ClientError::Protocol(_) => true,
            ClientError::InvalidUrl { .. }
            | ClientError::OfferAlreadySent
            | ClientError::Answer(_)
            | ClientError::RetriesExhausted(_) => false,
        }
    }
}

/// Produces the camera's answer for a viewer offer
pub trait AnswerProvider: Send + Sync {
    /// Create an answer SDP for `offer_sdp`
    fn create_answer(&self, offer_sdp: &str) -> impl Future<Output = Result<String, ClientError>> + Send;
}

/// Consumes candidates received from the remote peer
pub trait CandidateSink: Send + Sync {
    /// `None` marks the end of the remote candidates
    fn add_remote_candidate(&self, candidate: Option<IceCandidate>);
}

impl CandidateSink for mpsc::UnboundedSender<Option<IceCandidate>> {
    fn add_remote_candidate(&self, candidate: Option<IceCandidate>) {
        let _ = self.send(candidate);
    }
}

/// Reject URLs that can never connect
pub fn validate_url(url: &str) -> Result<(), ClientError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(ClientError::InvalidUrl {
            url: url.to_string(),
            reason: "scheme must be ws:// or wss://".to_string(),
        })
    }
}

/// Open one WebSocket connection to the relay
pub async fn connect(url: &str) -> Result<RelayStream, ClientError> {
    validate_url(url)?;
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(stream)
}
