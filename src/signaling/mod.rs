//! Camera/viewer signaling
//!
//! This module provides the relay core:
//! - Wire message decoding
//! - The connection registry and its offer/candidate mailbox
//! - Routing of inbound messages between camera and viewer

pub mod message;
pub mod registry;
pub mod router;

pub use message::{Envelope, IceCandidate, MessageKind, SignalingMessage, SignalingParser};
pub use registry::{CandidateCache, Mailbox, MailboxSnapshot, Registry, DEFAULT_CANDIDATE_LIMIT};
pub use router::{RouteOutcome, Router};

/// Signaling decode/encode errors
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    /// Frame is not a JSON object
    #[error("Unknown message format: {0}")]
    UnknownFormat(String),
    /// JSON object without a string `type`
    #[error("Missing message type")]
    MissingType,
    /// `type` names no relayed message
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    /// Invalid JSON or missing fields for the tagged variant
    #[error("Invalid signaling message: {0}")]
    Json(#[from] serde_json::Error),
}
