//! Signaling Protocol
//!
//! JSON text frames exchanged between the camera, the viewer and the relay.
//! The relay only reads the `type` tag ([`MessageKind`]); SDP and ICE
//! payloads are carried, never interpreted. Peer clients decode the full
//! [`SignalingMessage`].
//!
//! The outer `type` key is the message tag. The negotiation kind of an offer
//! or answer travels in a separate `sdpType` key; when that key is absent the
//! kind is the message tag itself.

use super::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire tag of the camera registration message
pub const JOIN_TYPE: &str = "camera_join";

/// ICE candidate as produced by the browser / peer connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, sdp_mline_index: Option<u16>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_mline_index,
        }
    }
}

/// Signaling message types relayed between camera and viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Camera announces its presence
    #[serde(rename = "camera_join")]
    Join,

    /// SDP offer from the viewer
    Offer {
        sdp: String,
        #[serde(rename = "sdpType", default, skip_serializing_if = "Option::is_none")]
        sdp_type: Option<String>,
    },

    /// SDP answer from the camera
    Answer {
        sdp: String,
        #[serde(rename = "sdpType", default, skip_serializing_if = "Option::is_none")]
        sdp_type: Option<String>,
    },

    /// ICE candidate; `None` marks the end of gathering
    Candidate {
        #[serde(default)]
        candidate: Option<IceCandidate>,
    },
}

impl SignalingMessage {
    /// Parse a signaling message from JSON
    pub fn from_json(json: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Create an offer message
    pub fn offer(sdp: impl Into<String>) -> Self {
        SignalingMessage::Offer {
            sdp: sdp.into(),
            sdp_type: None,
        }
    }

    /// Create an answer message
    pub fn answer(sdp: impl Into<String>) -> Self {
        SignalingMessage::Answer {
            sdp: sdp.into(),
            sdp_type: None,
        }
    }

    /// Create an ICE candidate message
    pub fn candidate(candidate: Option<IceCandidate>) -> Self {
        SignalingMessage::Candidate { candidate }
    }

    /// Wire tag of this message
    pub fn message_type(&self) -> &'static str {
        match self {
            SignalingMessage::Join => JOIN_TYPE,
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::Candidate { .. } => "candidate",
        }
    }

    /// Negotiation kind of an offer or answer
    pub fn sdp_type(&self) -> Option<&str> {
        match self {
            SignalingMessage::Offer { sdp_type, .. } => Some(sdp_type.as_deref().unwrap_or("offer")),
            SignalingMessage::Answer { sdp_type, .. } => Some(sdp_type.as_deref().unwrap_or("answer")),
            _ => None,
        }
    }
}

/// Message kind as named by the `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Join,
    Offer,
    Answer,
    Candidate,
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            JOIN_TYPE => Some(MessageKind::Join),
            "offer" => Some(MessageKind::Offer),
            "answer" => Some(MessageKind::Answer),
            "candidate" => Some(MessageKind::Candidate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Join => JOIN_TYPE,
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::Candidate => "candidate",
        }
    }
}

/// Classified frame together with its original text.
///
/// Forwarding always uses `text`, so peers receive exactly what was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: MessageKind,
    text: String,
}

impl Envelope {
    /// Classify a text frame by its tag; the rest of the frame is not checked
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        let (kind, _) = SignalingParser::classify(text)?;
        Ok(Self {
            kind,
            text: text.to_string(),
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Signaling message parser for WebSocket text frames
pub struct SignalingParser;

impl SignalingParser {
    /// Read the `type` tag of a frame.
    ///
    /// Frames must be JSON objects carrying a known tag. Nothing else in the
    /// object is looked at.
    pub fn classify(text: &str) -> Result<(MessageKind, Value), SignalingError> {
        let text = text.trim();

        if !text.starts_with('{') {
            return Err(SignalingError::UnknownFormat(
                text.chars().take(50).collect(),
            ));
        }

        let value: Value = serde_json::from_str(text)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SignalingError::MissingType)?;

        match MessageKind::from_tag(tag) {
            Some(kind) => Ok((kind, value)),
            None => Err(SignalingError::UnknownType(tag.to_string())),
        }
    }

    /// Decode a frame into a typed signaling message
    ///
    /// Extra keys are tolerated so browser payloads (`usernameFragment`, ...)
    /// still decode.
    pub fn parse(text: &str) -> Result<SignalingMessage, SignalingError> {
        let (_, value) = Self::classify(text)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camera_join() {
        let msg = SignalingParser::parse(r#"{"type": "camera_join"}"#).unwrap();
        assert_eq!(msg, SignalingMessage::Join);
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"camera_join"}"#);
    }

    #[test]
    fn test_parse_browser_offer() {
        let json = r#"{"type": "offer", "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1\r\n"}"#;
        let msg = SignalingParser::parse(json).unwrap();
        match &msg {
            SignalingMessage::Offer { sdp, sdp_type } => {
                assert!(sdp.starts_with("v=0"));
                assert!(sdp_type.is_none());
            }
            _ => panic!("Expected Offer"),
        }
        assert_eq!(msg.sdp_type(), Some("offer"));
    }

    #[test]
    fn test_explicit_sdp_type_is_kept() {
        let json = r#"{"type": "answer", "sdp": "v=0", "sdpType": "pranswer"}"#;
        let msg = SignalingParser::parse(json).unwrap();
        assert_eq!(msg.message_type(), "answer");
        assert_eq!(msg.sdp_type(), Some("pranswer"));
    }

    #[test]
    fn test_parse_candidate_with_extra_fields() {
        let json = r#"{"type":"candidate","candidate":{"candidate":"candidate:1 1 udp 2122260223 192.168.1.4 54321 typ host","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"abcd"}}"#;
        let msg = SignalingParser::parse(json).unwrap();
        let expected = IceCandidate::new(
            "candidate:1 1 udp 2122260223 192.168.1.4 54321 typ host",
            Some("0".to_string()),
            Some(0),
        );
        assert_eq!(msg, SignalingMessage::candidate(Some(expected)));
    }

    #[test]
    fn test_parse_end_of_candidates() {
        let msg = SignalingParser::parse(r#"{"type":"candidate","candidate":null}"#).unwrap();
        assert_eq!(msg, SignalingMessage::Candidate { candidate: None });
    }

    #[test]
    fn test_rejects_missing_and_unknown_type() {
        assert!(matches!(
            SignalingParser::parse(r#"{"sdp": "v=0"}"#),
            Err(SignalingError::MissingType)
        ));
        assert!(matches!(
            SignalingParser::parse(r#"{"type": "bye"}"#),
            Err(SignalingError::UnknownType(t)) if t == "bye"
        ));
        assert!(matches!(
            SignalingParser::parse("webrtc,offer,v=0"),
            Err(SignalingError::UnknownFormat(_))
        ));
        assert!(matches!(
            SignalingParser::parse(r#"{"type": "offer"}"#),
            Err(SignalingError::Json(_))
        ));
    }

    #[test]
    fn test_envelope_keeps_original_text() {
        let text = r#"{"type":"offer","sdp":"A","extra":{"k":1}}"#;
        let envelope = Envelope::parse(text).unwrap();
        assert_eq!(envelope.text(), text);
        assert_eq!(envelope.kind(), MessageKind::Offer);
    }

    #[test]
    fn test_envelope_does_not_inspect_payloads() {
        let frames = [
            (r#"{"type":"candidate","candidate":{"candidate":"c","sdpMid":"0","sdpMLineIndex":-1}}"#, MessageKind::Candidate),
            (r#"{"type":"candidate","candidate":{"candidate":"c","sdpMid":0,"sdpMLineIndex":0}}"#, MessageKind::Candidate),
            (r#"{"type":"candidate","candidate":{"sdpMid":"0","sdpMLineIndex":0}}"#, MessageKind::Candidate),
            (r#"{"type":"candidate","candidate":"candidate:1 1 udp 2122260223 10.0.0.1 5000 typ host"}"#, MessageKind::Candidate),
            (r#"{"type":"offer"}"#, MessageKind::Offer),
            (r#"{"type":"answer","sdp":{"nested":true}}"#, MessageKind::Answer),
        ];
        for (text, kind) in frames {
            let envelope = Envelope::parse(text).unwrap();
            assert_eq!(envelope.kind(), kind);
            assert_eq!(envelope.text(), text);
        }

        // Typed decoding stays strict for peer clients
        assert!(SignalingParser::parse(frames[3].0).is_err());
    }

    #[test]
    fn test_envelope_rejects_untagged_frames() {
        assert!(matches!(Envelope::parse("not json"), Err(SignalingError::UnknownFormat(_))));
        assert!(matches!(Envelope::parse(r#"{"sdp":"A"}"#), Err(SignalingError::MissingType)));
        assert!(matches!(Envelope::parse(r#"{"type":7}"#), Err(SignalingError::MissingType)));
        assert!(matches!(Envelope::parse(r#"{"type":"bye"}"#), Err(SignalingError::UnknownType(_))));
    }
}
