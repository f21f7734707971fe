//! Message router
//!
//! Classifies each inbound `(connection, message)` pair and applies the
//! relay rules against the registry:
//!
//! | Message   | Accepted from            | Effect                                          |
//! |-----------|--------------------------|-------------------------------------------------|
//! | join      | unassigned connection    | becomes camera, cached offer/candidates replayed |
//! | offer     | unassigned or viewer     | becomes viewer, offer cached and forwarded      |
//! | answer    | current camera           | forwarded to the viewer                          |
//! | candidate | current viewer           | forwarded to the camera, or cached               |
//! | candidate | current camera           | forwarded to the viewer                          |
//!
//! Anything else is discarded and the connection stays open. Forwarding
//! always sends the original frame text.

use super::message::{Envelope, MessageKind};
use super::registry::{CandidateCache, Mailbox, Registry};
use crate::metrics::RelayMetrics;
use crate::transport::peer::{Peer, PeerHandle, Role};
use log::{debug, info, warn};
use std::sync::Arc;

/// What the router did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Sender became the camera; `replayed` cached messages were queued to it
    CameraRegistered { replayed: usize },
    /// Delivered live to the other peer
    Forwarded,
    /// Stored in the mailbox for a future camera
    Cached,
    /// No peer to deliver to
    Dropped,
    /// Sender's role does not allow this message
    Ignored,
    /// Frame could not be decoded
    Malformed,
}

pub struct Router {
    registry: Arc<Registry>,
    metrics: Arc<RelayMetrics>,
    close_superseded: bool,
}

impl Router {
    pub fn new(registry: Arc<Registry>, metrics: Arc<RelayMetrics>, close_superseded: bool) -> Self {
        Self {
            registry,
            metrics,
            close_superseded,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Decode and route one text frame
    pub fn route_text(&self, peer: &PeerHandle, text: &str) -> RouteOutcome {
        match Envelope::parse(text) {
            Ok(envelope) => self.route(peer, envelope),
            Err(e) => {
                warn!("Discarding malformed message from {}: {}", peer.id(), e);
                self.metrics.record_dropped("malformed");
                RouteOutcome::Malformed
            }
        }
    }

    pub fn route(&self, peer: &PeerHandle, envelope: Envelope) -> RouteOutcome {
        match envelope.kind() {
            MessageKind::Join => self.on_join(peer),
            MessageKind::Offer => self.on_offer(peer, envelope),
            MessageKind::Answer => self.on_answer(peer, envelope),
            MessageKind::Candidate => self.on_candidate(peer, envelope),
        }
    }

    /// Run the registry cleanup matching the connection's role
    pub fn disconnect(&self, peer: &Peer) {
        match peer.role() {
            Role::Camera => {
                if self.registry.on_camera_disconnected(peer.id()) {
                    info!("Camera {} disconnected", peer.id());
                }
            }
            Role::Viewer => {
                if self.registry.on_viewer_disconnected(peer.id()) {
                    info!("Viewer {} disconnected. Clearing mailbox.", peer.id());
                }
            }
            Role::Unassigned => {
                debug!("Unassigned connection {} closed", peer.id());
            }
        }
    }

    fn on_join(&self, peer: &PeerHandle) -> RouteOutcome {
        if !peer.assign_role(Role::Camera) {
            return self.ignore(peer, "camera_join");
        }

        let registration = {
            let mut mailbox = self.registry.lock();
            let registration = mailbox.register_camera(peer.clone());
            if registration.delivery_failed {
                self.camera_lost(&mut mailbox, peer);
            }
            registration
        };

        info!(">>> Camera {} registered <<<", peer.id());
        if registration.replayed > 0 {
            info!("Delivered {} cached message(s) to camera {}", registration.replayed, peer.id());
            self.metrics.record_replayed(registration.replayed);
        }
        if let Some(old) = registration.superseded {
            self.retire(&old);
        }

        RouteOutcome::CameraRegistered {
            replayed: registration.replayed,
        }
    }

    fn on_offer(&self, peer: &PeerHandle, envelope: Envelope) -> RouteOutcome {
        match peer.role() {
            Role::Camera => return self.ignore(peer, "offer"),
            Role::Unassigned => {
                peer.assign_role(Role::Viewer);
            }
            Role::Viewer => {}
        }

        let (outcome, superseded) = {
            let mut mailbox = self.registry.lock();
            let superseded = mailbox.assign_or_keep_viewer(peer);

            let forwarded = match mailbox.current_camera().cloned() {
                Some(camera) => {
                    if camera.send_text(envelope.text()).is_ok() {
                        true
                    } else {
                        self.camera_lost(&mut mailbox, &camera);
                        false
                    }
                }
                None => false,
            };
            mailbox.set_offer(envelope);

            let outcome = if forwarded {
                RouteOutcome::Forwarded
            } else {
                RouteOutcome::Cached
            };
            (outcome, superseded)
        };

        match outcome {
            RouteOutcome::Forwarded => {
                info!("Received offer from viewer {}. Forwarded to camera.", peer.id());
                self.metrics.record_relayed("offer");
            }
            _ => {
                info!("Camera offline. Storing offer from viewer {} in mailbox.", peer.id());
                self.metrics.record_cached("offer");
            }
        }
        if let Some(old) = superseded {
            self.retire(&old);
        }

        outcome
    }

    fn on_answer(&self, peer: &PeerHandle, envelope: Envelope) -> RouteOutcome {
        let mut mailbox = self.registry.lock();
        if !mailbox.is_camera(peer.id()) {
            drop(mailbox);
            return self.ignore(peer, "answer");
        }

        let outcome = self.deliver_to_viewer(&mut mailbox, &envelope);
        drop(mailbox);

        if outcome == RouteOutcome::Forwarded {
            info!("Received answer from camera {}. Forwarded to viewer.", peer.id());
        }
        outcome
    }

    fn on_candidate(&self, peer: &PeerHandle, envelope: Envelope) -> RouteOutcome {
        let mut mailbox = self.registry.lock();

        if mailbox.is_viewer(peer.id()) {
            if let Some(camera) = mailbox.current_camera().cloned() {
                if camera.send_text(envelope.text()).is_ok() {
                    self.metrics.record_relayed("candidate");
                    return RouteOutcome::Forwarded;
                }
                self.camera_lost(&mut mailbox, &camera);
            }
            return match mailbox.append_candidate_if_no_camera(envelope) {
                CandidateCache::Stored => {
                    debug!(
                        "Cached candidate #{} from viewer {}",
                        mailbox.cached_candidates().len(),
                        peer.id()
                    );
                    self.metrics.record_cached("candidate");
                    RouteOutcome::Cached
                }
                CandidateCache::Full => {
                    warn!(
                        "Mailbox holds {} candidates; dropping candidate from viewer {}",
                        mailbox.candidate_limit(),
                        peer.id()
                    );
                    self.metrics.record_dropped("mailbox_full");
                    RouteOutcome::Dropped
                }
                CandidateCache::CameraPresent => RouteOutcome::Dropped,
            };
        }

        if mailbox.is_camera(peer.id()) {
            return self.deliver_to_viewer(&mut mailbox, &envelope);
        }

        drop(mailbox);
        self.ignore(peer, "candidate")
    }

    /// Forward a camera message to the viewer, if one is connected
    fn deliver_to_viewer(&self, mailbox: &mut Mailbox, envelope: &Envelope) -> RouteOutcome {
        let message_type = envelope.kind().as_str();
        let Some(viewer) = mailbox.current_viewer().cloned() else {
            debug!("No viewer connected; dropping {}", message_type);
            self.metrics.record_dropped("no_recipient");
            return RouteOutcome::Dropped;
        };

        if viewer.send_text(envelope.text()).is_ok() {
            self.metrics.record_relayed(message_type);
            return RouteOutcome::Forwarded;
        }

        warn!("Delivery to viewer {} failed; treating as disconnect", viewer.id());
        self.metrics.record_dropped("delivery_failed");
        if mailbox.on_viewer_disconnected(viewer.id()) {
            info!("Viewer {} disconnected. Clearing mailbox.", viewer.id());
        }
        RouteOutcome::Dropped
    }

    fn camera_lost(&self, mailbox: &mut Mailbox, camera: &Peer) {
        warn!("Delivery to camera {} failed; treating as disconnect", camera.id());
        self.metrics.record_dropped("delivery_failed");
        mailbox.on_camera_disconnected(camera.id());
    }

    fn ignore(&self, peer: &Peer, message_type: &str) -> RouteOutcome {
        debug!(
            "Ignoring {} from {} connection {}",
            message_type,
            peer.role(),
            peer.id()
        );
        self.metrics.record_dropped("role_violation");
        RouteOutcome::Ignored
    }

    /// Close a connection that a newer camera or viewer replaced
    fn retire(&self, old: &Peer) {
        if self.close_superseded {
            info!("Closing superseded {} connection {}", old.role(), old.id());
            old.close();
        } else {
            debug!("{} connection {} superseded", old.role(), old.id());
        }
    }
}
