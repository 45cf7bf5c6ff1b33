//! Bounded history of ingested messages, exposed for diagnostics

use super::InboundMessage;
use crate::gateway::ChatKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct LoggedMessage {
    pub from_uid: String,
    pub message_text: String,
    pub chat_kind: ChatKind,
    pub received_at: DateTime<Utc>,
}

/// FIFO of recent messages; the oldest entry is dropped once full
pub struct MessageLog {
    entries: Mutex<VecDeque<LoggedMessage>>,
    capacity: usize,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, message: &InboundMessage) {
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LoggedMessage {
            from_uid: message.from_uid.clone(),
            message_text: message.text.clone(),
            chat_kind: message.chat_kind,
            received_at: Utc::now(),
        });
    }

    /// Oldest first
    pub async fn snapshot(&self) -> Vec<LoggedMessage> {
        self.entries.lock().await.iter().cloned().collect()
    }
}
