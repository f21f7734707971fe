//! camlink-relay - camera/viewer signaling relay
//!
//! Brokers the WebRTC negotiation between one camera and one viewer. Offers
//! and candidates sent while the camera is away are kept in a mailbox and
//! replayed, in order, when the camera joins.

pub mod client;
pub mod config;
pub mod metrics;
pub mod signaling;
pub mod transport;
pub mod web;

// Re-exports
pub use config::Config;
pub use signaling::{Registry, Router, SignalingMessage};
pub use transport::RelayServer;
pub use web::SharedState;
