//! Connection registry
//!
//! Tracks the current camera and viewer connections and the mailbox: the
//! last offer plus the viewer candidates that arrived while no camera was
//! present. Everything sits behind one lock; callers that need several steps
//! to happen atomically take the guard from [`Registry::lock`].

use super::message::Envelope;
use crate::transport::peer::{PeerHandle, PeerId};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

/// Result of registering a camera connection
#[derive(Debug, Default)]
pub struct CameraRegistration {
    /// Previous camera connection, if a different one was registered
    pub superseded: Option<PeerHandle>,
    /// Cached messages queued to the new camera
    pub replayed: usize,
    /// Replay stopped because the new camera's writer is gone
    pub delivery_failed: bool,
}

/// Cached candidates kept per offer unless configured otherwise
pub const DEFAULT_CANDIDATE_LIMIT: usize = 256;

/// Result of offering a viewer candidate to the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateCache {
    Stored,
    /// A camera is registered; candidates go to it live
    CameraPresent,
    /// The candidate limit is reached
    Full,
}

/// Camera/viewer references and cached negotiation messages
#[derive(Debug)]
pub struct Mailbox {
    camera: Option<PeerHandle>,
    viewer: Option<PeerHandle>,
    cached_offer: Option<Envelope>,
    cached_candidates: Vec<Envelope>,
    candidate_limit: usize,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::with_candidate_limit(DEFAULT_CANDIDATE_LIMIT)
    }
}

impl Mailbox {
    pub fn with_candidate_limit(candidate_limit: usize) -> Self {
        Self {
            camera: None,
            viewer: None,
            cached_offer: None,
            cached_candidates: Vec::new(),
            candidate_limit,
        }
    }

    /// Make `peer` the camera and replay the cached offer and candidates to it.
    ///
    /// The previous camera is returned, not closed.
    pub fn register_camera(&mut self, peer: PeerHandle) -> CameraRegistration {
        let mut registration = CameraRegistration::default();

        if let Some(offer) = &self.cached_offer {
            for envelope in std::iter::once(offer).chain(self.cached_candidates.iter()) {
                if peer.send_text(envelope.text()).is_err() {
                    registration.delivery_failed = true;
                    break;
                }
                registration.replayed += 1;
            }
        }

        let previous = self.camera.replace(peer.clone());
        registration.superseded = previous.filter(|old| old.id() != peer.id());
        registration
    }

    /// Make `peer` the viewer unless it already is. Returns the superseded viewer.
    pub fn assign_or_keep_viewer(&mut self, peer: &PeerHandle) -> Option<PeerHandle> {
        if self.is_viewer(peer.id()) {
            return None;
        }
        self.viewer.replace(peer.clone())
    }

    /// Store `offer` as the cached offer and forget older candidates
    pub fn set_offer(&mut self, offer: Envelope) {
        self.cached_offer = Some(offer);
        self.cached_candidates.clear();
    }

    /// Cache a viewer candidate while no camera is registered
    pub fn append_candidate_if_no_camera(&mut self, candidate: Envelope) -> CandidateCache {
        if self.camera.is_some() {
            return CandidateCache::CameraPresent;
        }
        if self.cached_candidates.len() >= self.candidate_limit {
            return CandidateCache::Full;
        }
        self.cached_candidates.push(candidate);
        CandidateCache::Stored
    }

    pub fn candidate_limit(&self) -> usize {
        self.candidate_limit
    }

    /// Forget the camera if `id` is the registered one; offer and viewer are kept
    pub fn on_camera_disconnected(&mut self, id: PeerId) -> bool {
        if !self.is_camera(id) {
            return false;
        }
        self.camera = None;
        true
    }

    /// Forget the viewer and its session if `id` is the registered one
    pub fn on_viewer_disconnected(&mut self, id: PeerId) -> bool {
        if !self.is_viewer(id) {
            return false;
        }
        self.viewer = None;
        self.cached_offer = None;
        self.cached_candidates.clear();
        true
    }

    pub fn current_camera(&self) -> Option<&PeerHandle> {
        self.camera.as_ref()
    }

    pub fn current_viewer(&self) -> Option<&PeerHandle> {
        self.viewer.as_ref()
    }

    pub fn is_camera(&self, id: PeerId) -> bool {
        self.camera.as_ref().is_some_and(|p| p.id() == id)
    }

    pub fn is_viewer(&self, id: PeerId) -> bool {
        self.viewer.as_ref().is_some_and(|p| p.id() == id)
    }

    pub fn cached_offer(&self) -> Option<&Envelope> {
        self.cached_offer.as_ref()
    }

    pub fn cached_candidates(&self) -> &[Envelope] {
        &self.cached_candidates
    }

    pub fn snapshot(&self) -> MailboxSnapshot {
        MailboxSnapshot {
            camera_connected: self.camera.is_some(),
            viewer_connected: self.viewer.is_some(),
            offer_cached: self.cached_offer.is_some(),
            cached_candidates: self.cached_candidates.len(),
            camera_id: self.camera.as_ref().map(|p| p.id()),
            viewer_id: self.viewer.as_ref().map(|p| p.id()),
        }
    }
}

/// Point-in-time view of the mailbox, for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxSnapshot {
    pub camera_connected: bool,
    pub viewer_connected: bool,
    pub offer_cached: bool,
    pub cached_candidates: usize,
    pub camera_id: Option<PeerId>,
    pub viewer_id: Option<PeerId>,
}

/// Process-wide registry; the single serialization point for relay state
#[derive(Debug, Default)]
pub struct Registry {
    mailbox: Mutex<Mailbox>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose mailbox keeps at most `limit` candidates per offer
    pub fn with_candidate_limit(limit: usize) -> Self {
        Self {
            mailbox: Mutex::new(Mailbox::with_candidate_limit(limit)),
        }
    }

    /// Exclusive access to the mailbox. Keep the guard for the whole of a
    /// compound action and never hold it across an await.
    pub fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock()
    }

    pub fn on_camera_disconnected(&self, id: PeerId) -> bool {
        self.lock().on_camera_disconnected(id)
    }

    pub fn on_viewer_disconnected(&self, id: PeerId) -> bool {
        self.lock().on_viewer_disconnected(id)
    }

    pub fn current_viewer(&self) -> Option<PeerHandle> {
        self.lock().current_viewer().cloned()
    }

    pub fn snapshot(&self) -> MailboxSnapshot {
        self.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::message::MessageKind;
    use crate::transport::peer::testing::{drain_text, peer};

    fn env(text: &str) -> Envelope {
        Envelope::parse(text).unwrap()
    }

    const OFFER: &str = r#"{"type":"offer","sdp":"A"}"#;

    fn candidate(n: u32) -> String {
        format!(r#"{{"type":"candidate","candidate":{{"candidate":"c{}","sdpMid":"0","sdpMLineIndex":0}}}}"#, n)
    }

    #[test]
    fn register_camera_without_offer_replays_nothing() {
        let mut mailbox = Mailbox::default();
        let (camera, mut rx) = peer();
        let registration = mailbox.register_camera(camera.clone());
        assert_eq!(registration.replayed, 0);
        assert!(registration.superseded.is_none());
        assert!(mailbox.is_camera(camera.id()));
        assert!(drain_text(&mut rx).is_empty());
    }

    #[test]
    fn register_camera_replays_offer_then_candidates_in_order() {
        let mut mailbox = Mailbox::default();
        mailbox.set_offer(env(OFFER));
        for n in 1..=3 {
            assert_eq!(
                mailbox.append_candidate_if_no_camera(env(&candidate(n))),
                CandidateCache::Stored
            );
        }

        let (camera, mut rx) = peer();
        let registration = mailbox.register_camera(camera);
        assert_eq!(registration.replayed, 4);
        assert_eq!(
            drain_text(&mut rx),
            vec![OFFER.to_string(), candidate(1), candidate(2), candidate(3)]
        );
        // Replay does not consume the mailbox
        assert!(mailbox.cached_offer().is_some());
        assert_eq!(mailbox.cached_candidates().len(), 3);
    }

    #[test]
    fn candidates_are_not_cached_while_camera_present() {
        let mut mailbox = Mailbox::default();
        let (camera, _rx) = peer();
        mailbox.register_camera(camera);
        assert_eq!(
            mailbox.append_candidate_if_no_camera(env(&candidate(1))),
            CandidateCache::CameraPresent
        );
        assert!(mailbox.cached_candidates().is_empty());
    }

    #[test]
    fn new_offer_replaces_old_and_clears_candidates() {
        let mut mailbox = Mailbox::default();
        mailbox.set_offer(env(OFFER));
        mailbox.append_candidate_if_no_camera(env(&candidate(1)));
        mailbox.set_offer(env(r#"{"type":"offer","sdp":"C"}"#));
        assert_eq!(mailbox.cached_offer().unwrap().kind(), MessageKind::Offer);
        assert_eq!(mailbox.cached_offer().unwrap().text(), r#"{"type":"offer","sdp":"C"}"#);
        assert!(mailbox.cached_candidates().is_empty());
    }

    #[test]
    fn viewer_disconnect_clears_mailbox() {
        let mut mailbox = Mailbox::default();
        let (viewer, _rx) = peer();
        mailbox.assign_or_keep_viewer(&viewer);
        mailbox.set_offer(env(OFFER));
        mailbox.append_candidate_if_no_camera(env(&candidate(1)));

        assert!(mailbox.on_viewer_disconnected(viewer.id()));
        assert!(mailbox.current_viewer().is_none());
        assert!(mailbox.cached_offer().is_none());
        assert!(mailbox.cached_candidates().is_empty());

        let (camera, mut rx) = peer();
        assert_eq!(mailbox.register_camera(camera).replayed, 0);
        assert!(drain_text(&mut rx).is_empty());
    }

    #[test]
    fn camera_disconnect_keeps_viewer_and_mailbox() {
        let mut mailbox = Mailbox::default();
        let (viewer, _vrx) = peer();
        let (camera, _crx) = peer();
        mailbox.assign_or_keep_viewer(&viewer);
        mailbox.set_offer(env(OFFER));
        mailbox.append_candidate_if_no_camera(env(&candidate(1)));
        mailbox.register_camera(camera.clone());

        assert!(mailbox.on_camera_disconnected(camera.id()));
        assert!(mailbox.current_camera().is_none());
        assert!(mailbox.is_viewer(viewer.id()));
        assert!(mailbox.cached_offer().is_some());
        assert_eq!(mailbox.cached_candidates().len(), 1);

        let (rejoined, mut rx) = peer();
        assert_eq!(mailbox.register_camera(rejoined).replayed, 2);
        assert_eq!(drain_text(&mut rx), vec![OFFER.to_string(), candidate(1)]);
    }

    #[test]
    fn cleanup_for_other_connection_is_a_no_op() {
        let mut mailbox = Mailbox::default();
        let (old_viewer, _a) = peer();
        let (new_viewer, _b) = peer();
        mailbox.assign_or_keep_viewer(&old_viewer);
        let superseded = mailbox.assign_or_keep_viewer(&new_viewer);
        assert_eq!(superseded.map(|p| p.id()), Some(old_viewer.id()));
        mailbox.set_offer(env(OFFER));

        assert!(!mailbox.on_viewer_disconnected(old_viewer.id()));
        assert!(mailbox.is_viewer(new_viewer.id()));
        assert!(mailbox.cached_offer().is_some());

        assert!(!mailbox.on_camera_disconnected(old_viewer.id()));
    }

    #[test]
    fn keeping_the_same_viewer_supersedes_nothing() {
        let mut mailbox = Mailbox::default();
        let (viewer, _rx) = peer();
        assert!(mailbox.assign_or_keep_viewer(&viewer).is_none());
        assert!(mailbox.assign_or_keep_viewer(&viewer).is_none());
    }

    #[test]
    fn superseded_camera_is_returned() {
        let mut mailbox = Mailbox::default();
        let (first, _a) = peer();
        let (second, _b) = peer();
        mailbox.register_camera(first.clone());
        let registration = mailbox.register_camera(second.clone());
        assert_eq!(registration.superseded.map(|p| p.id()), Some(first.id()));
        assert!(mailbox.is_camera(second.id()));
        assert!(!mailbox.on_camera_disconnected(first.id()));
        assert!(mailbox.is_camera(second.id()));
    }

    #[test]
    fn replay_to_closed_camera_reports_failure() {
        let mut mailbox = Mailbox::default();
        mailbox.set_offer(env(OFFER));
        let (camera, rx) = peer();
        drop(rx);
        let registration = mailbox.register_camera(camera);
        assert!(registration.delivery_failed);
        assert_eq!(registration.replayed, 0);
    }

    #[test]
    fn duplicate_candidates_are_kept() {
        let mut mailbox = Mailbox::default();
        mailbox.set_offer(env(OFFER));
        mailbox.append_candidate_if_no_camera(env(&candidate(7)));
        mailbox.append_candidate_if_no_camera(env(&candidate(7)));

        let (camera, mut rx) = peer();
        mailbox.register_camera(camera);
        assert_eq!(
            drain_text(&mut rx),
            vec![OFFER.to_string(), candidate(7), candidate(7)]
        );
    }

    #[test]
    fn registry_snapshot_reflects_state() {
        let registry = Registry::new();
        let (viewer, _rx) = peer();
        {
            let mut mailbox = registry.lock();
            mailbox.assign_or_keep_viewer(&viewer);
            mailbox.set_offer(env(OFFER));
            mailbox.append_candidate_if_no_camera(env(&candidate(1)));
        }
        let snapshot = registry.snapshot();
        assert!(!snapshot.camera_connected);
        assert!(snapshot.viewer_connected);
        assert!(snapshot.offer_cached);
        assert_eq!(snapshot.cached_candidates, 1);
        assert_eq!(snapshot.viewer_id, Some(viewer.id()));

        assert!(registry.on_viewer_disconnected(viewer.id()));
        assert!(!registry.snapshot().offer_cached);
        assert!(registry.current_viewer().is_none());
    }

    #[test]
    fn candidates_beyond_limit_are_refused() {
        let mut mailbox = Mailbox::with_candidate_limit(2);
        mailbox.set_offer(env(OFFER));
        for n in 1..=2 {
            assert_eq!(
                mailbox.append_candidate_if_no_camera(env(&candidate(n))),
                CandidateCache::Stored
            );
        }
        assert_eq!(
            mailbox.append_candidate_if_no_camera(env(&candidate(3))),
            CandidateCache::Full
        );
        assert_eq!(mailbox.cached_candidates().len(), 2);

        // A new offer starts a fresh budget
        mailbox.set_offer(env(OFFER));
        assert_eq!(
            mailbox.append_candidate_if_no_camera(env(&candidate(4))),
            CandidateCache::Stored
        );
    }
}
