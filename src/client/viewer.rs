//! Viewer-side relay client
//!
//! A `ViewerSession` is one negotiation on one connection: one offer out,
//! candidates both ways, one answer back. Reconnecting means opening a new
//! session with a fresh offer.

use super::{connect, validate_url, CandidateSink, ClientError, RelayStream, RetryPolicy};
use crate::signaling::{IceCandidate, SignalingMessage, SignalingParser};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::time;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Something the relay delivered to the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// The camera's answer; reported once per session
    Answer(String),
    /// Candidate from the camera; `None` ends the remote candidates
    RemoteCandidate(Option<IceCandidate>),
    /// The relay closed the connection
    Closed,
}

pub struct ViewerSession {
    write: SplitSink<RelayStream, Message>,
    read: SplitStream<RelayStream>,
    offered: bool,
    answered: bool,
}

impl ViewerSession {
    /// Connect to the relay, retrying per `retry`
    pub async fn connect(url: &str, retry: &RetryPolicy) -> Result<Self, ClientError> {
        validate_url(url)?;
        let mut failures = 0u32;

        loop {
            match connect(url).await {
                Ok(stream) => {
                    info!("Viewer connected to relay {}", url);
                    let (write, read) = stream.split();
                    return Ok(Self {
                        write,
                        read,
                        offered: false,
                        answered: false,
                    });
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    warn!("Failed to connect to relay {} (attempt {}): {}", url, failures, e);
                    if !retry.should_retry(failures) {
                        return Err(ClientError::RetriesExhausted(failures));
                    }
                    time::sleep(retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send this session's offer; a session carries exactly one
    pub async fn send_offer(&mut self, sdp: &str) -> Result<(), ClientError> {
        if self.offered {
            return Err(ClientError::OfferAlreadySent);
        }
        self.send(&SignalingMessage::offer(sdp)).await?;
        self.offered = true;
        debug!("Sent offer ({} bytes)", sdp.len());
        Ok(())
    }

    /// Send a local candidate; `None` ends local gathering
    pub async fn send_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<(), ClientError> {
        self.send(&SignalingMessage::candidate(candidate)).await
    }

    /// Next message the relay delivered. Repeated answers are skipped.
    pub async fn next_event(&mut self) -> Result<ViewerEvent, ClientError> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => match SignalingParser::parse(&text) {
                    Ok(SignalingMessage::Answer { sdp, .. }) => {
                        if self.answered {
                            debug!("Ignoring additional answer");
                            continue;
                        }
                        self.answered = true;
                        return Ok(ViewerEvent::Answer(sdp));
                    }
                    Ok(SignalingMessage::Candidate { candidate }) => {
                        return Ok(ViewerEvent::RemoteCandidate(candidate));
                    }
                    Ok(other) => debug!("Ignoring {} from relay", other.message_type()),
                    Err(e) => warn!("Ignoring malformed relay message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(ViewerEvent::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Wait for the answer, handing earlier camera candidates to `sink`
    pub async fn wait_for_answer(&mut self, sink: &impl CandidateSink) -> Result<String, ClientError> {
        loop {
            match self.next_event().await? {
                ViewerEvent::Answer(sdp) => return Ok(sdp),
                ViewerEvent::RemoteCandidate(candidate) => sink.add_remote_candidate(candidate),
                ViewerEvent::Closed => return Err(ClientError::Closed),
            }
        }
    }

    pub fn is_answered(&self) -> bool {
        self.answered
    }

    /// End the session; the relay forgets the cached offer
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<(), ClientError> {
        self.write.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }
}
