//! Camera-side relay client
//!
//! Keeps a connection to the relay for as long as the process runs:
//! join on every connection, answer every offer, exchange candidates, and
//! reconnect with a fixed delay whenever the connection drops.

use super::{connect, validate_url, AnswerProvider, CandidateSink, ClientError, RelayStream, RetryPolicy};
use crate::signaling::{IceCandidate, SignalingMessage, SignalingParser};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_tungstenite::tungstenite::protocol::Message;

type RelaySink = SplitSink<RelayStream, Message>;

/// How a relay connection ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Shutdown,
}

pub struct CameraClient<A, S> {
    url: String,
    retry: RetryPolicy,
    answers: A,
    sink: S,
    local_candidates: Option<mpsc::UnboundedReceiver<IceCandidate>>,
}

impl<A: AnswerProvider, S: CandidateSink> CameraClient<A, S> {
    pub fn new(url: impl Into<String>, answers: A, sink: S) -> Self {
        Self {
            url: url.into(),
            retry: RetryPolicy::default(),
            answers,
            sink,
            local_candidates: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Candidates gathered locally, sent to the viewer through the relay
    pub fn with_local_candidates(mut self, candidates: mpsc::UnboundedReceiver<IceCandidate>) -> Self {
        self.local_candidates = Some(candidates);
        self
    }

    /// Connect, serve and reconnect until `shutdown` flips to true (or its
    /// sender is dropped). Only non-transient errors end the loop early.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ClientError> {
        validate_url(&self.url)?;
        let mut failures = 0u32;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let connected = tokio::select! {
                result = connect(&self.url) => result,
                _ = shutdown.changed() => return Ok(()),
            };

            match connected {
                Ok(stream) => {
                    failures = 0;
                    info!("Connected to relay {}", self.url);
                    match self.serve(stream, &mut shutdown).await {
                        Ok(SessionEnd::Shutdown) => return Ok(()),
                        Ok(SessionEnd::Closed) => info!("Relay closed the connection"),
                        Err(e) if e.is_transient() => warn!("Relay connection lost: {}", e),
                        Err(e) => return Err(e),
                    }
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    warn!("Failed to connect to relay {} (attempt {}): {}", self.url, failures, e);
                    if !self.retry.should_retry(failures) {
                        return Err(ClientError::RetriesExhausted(failures));
                    }
                }
                Err(e) => return Err(e),
            }

            info!("Reconnecting in {:?}", self.retry.delay);
            tokio::select! {
                _ = time::sleep(self.retry.delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn serve(
        &mut self,
        stream: RelayStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, ClientError> {
        let (mut write, mut read) = stream.split();

        // Nothing else may precede the join
        write.send(Message::Text(SignalingMessage::Join.to_json()?)).await?;
        debug!("Sent camera_join");

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        Self::handle_text(&self.answers, &self.sink, &text, &mut write).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
                candidate = next_local(&mut self.local_candidates) => match candidate {
                    Some(candidate) => {
                        let text = SignalingMessage::candidate(Some(candidate)).to_json()?;
                        write.send(Message::Text(text)).await?;
                    }
                    None => self.local_candidates = None,
                },
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }

    async fn handle_text(
        answers: &A,
        sink: &S,
        text: &str,
        write: &mut RelaySink,
    ) -> Result<(), ClientError> {
        match SignalingParser::parse(text) {
            Ok(SignalingMessage::Offer { sdp, .. }) => {
                info!("Received offer ({} bytes); creating answer", sdp.len());
                match answers.create_answer(&sdp).await {
                    Ok(answer) => {
                        write
                            .send(Message::Text(SignalingMessage::answer(answer).to_json()?))
                            .await?;
                        info!("Sent answer");
                    }
                    Err(e) => warn!("Could not answer offer: {}", e),
                }
            }
            Ok(SignalingMessage::Candidate { candidate }) => sink.add_remote_candidate(candidate),
            Ok(other) => debug!("Ignoring {} from relay", other.message_type()),
            Err(e) => warn!("Ignoring malformed relay message: {}", e),
        }
        Ok(())
    }
}

/// Next local candidate, or pending forever when there is no source
async fn next_local(candidates: &mut Option<mpsc::UnboundedReceiver<IceCandidate>>) -> Option<IceCandidate> {
    match candidates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
