//! Per-quiz fan-out for live editors.
//!
//! Every quiz with at least one subscriber owns a `tokio::sync::broadcast`
//! channel. Two topics travel on it: presence snapshots and full quiz
//! snapshots after an accepted change. Slow receivers may lag and skip
//! frames, which is fine because each frame is a complete snapshot.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::presence::PresenceSnapshot;
use crate::models::quiz::Quiz;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "snake_case")]
pub enum QuizEvent {
    Presence(PresenceSnapshot),
    Changes(Box<Quiz>),
}

pub struct QuizHub {
    capacity: usize,
    channels: Mutex<HashMap<Uuid, broadcast::Sender<QuizEvent>>>,
}

impl QuizHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, quiz_id: Uuid) -> broadcast::Receiver<QuizEvent> {
        let mut channels = self.channels.lock().expect("hub mutex poisoned");
        channels
            .entry(quiz_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, quiz_id: Uuid, event: QuizEvent) -> usize {
        let channels = self.channels.lock().expect("hub mutex poisoned");
        let Some(tx) = channels.get(&quiz_id) else {
            tracing::debug!(%quiz_id, "no live channel for quiz");
            return 0;
        };
        match tx.send(event) {
            Ok(count) => {
                tracing::debug!(%quiz_id, subscribers = count, "quiz event broadcast");
                count
            }
            Err(_) => {
                tracing::debug!(%quiz_id, "no subscribers to receive quiz event");
                0
            }
        }
    }

    /// Drops the quiz channel once nobody listens any more.
    pub fn prune(&self, quiz_id: Uuid) {
        let mut channels = self.channels.lock().expect("hub mutex poisoned");
        if channels
            .get(&quiz_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(&quiz_id);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().expect("hub mutex poisoned").len()
    }
}
