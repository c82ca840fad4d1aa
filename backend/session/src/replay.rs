//! Deterministic agent client backed by a recorded transcript.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use capforge_core::{AgentClient, AgentEvent, CapError, ContentPart, EventStream};

/// Plays back pre-recorded turns instead of talking to a live model.
///
/// Each `send_message_stream` call consumes the next turn of the transcript;
/// once exhausted, exchanges yield an empty stream, which ends the session.
#[derive(Debug)]
pub struct ReplayClient {
    turns: Mutex<VecDeque<Vec<AgentEvent>>>,
}

impl ReplayClient {
    pub fn new(turns: Vec<Vec<AgentEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }

    /// Load a transcript file: a JSON array of turns, each an array of
    /// events in stream order.
    pub async fn from_path(path: &Path) -> Result<Self, CapError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CapError::Replay(format!("cannot read {}: {e}", path.display())))?;
        let turns: Vec<Vec<AgentEvent>> = serde_json::from_str(&raw)
            .map_err(|e| CapError::Replay(format!("invalid transcript {}: {e}", path.display())))?;
        Ok(Self::new(turns))
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentClient for ReplayClient {
    async fn send_message_stream(
        &self,
        _parts: Vec<ContentPart>,
        cancel: CancellationToken,
        prompt_id: &str,
    ) -> Result<EventStream, CapError> {
        let events = self.turns.lock().unwrap().pop_front().unwrap_or_default();
        debug!(prompt_id, events = events.len(), "Replaying transcript turn");

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for event in events {
                if cancel.is_cancelled() {
                    break;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(ReceiverStream::new(rx))
    }
}
