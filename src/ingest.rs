//! Gateway polling loop
//!
//! Each cycle fetches one batch, decodes every raw message independently,
//! records it in the message log, and hands non-control messages to the
//! agent. Nothing that goes wrong inside a cycle stops the loop: fetch
//! failures, malformed groups or messages, and panicking dispatches are
//! logged and the next cycle runs after the usual delay.

mod message_log;

pub use message_log::{LoggedMessage, MessageLog};

use crate::agent::Agent;
use crate::config::IngestConfig;
use crate::gateway::{
    ChatKind, GatewayError, GatewayReply, GroupItem, MessageBody, MessageSource,
    TRANSIENT_ERROR_CODE,
};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Messages starting with this prefix are recorded but never answered
pub const CONTROL_PREFIX: &str = "vote:";

/// How a batch is handed to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One message at a time, in gateway order
    Sequential,
    /// One task per sender; a sender's messages stay in order
    #[default]
    PerUser,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(DispatchMode::Sequential),
            "per_user" | "per-user" => Ok(DispatchMode::PerUser),
            other => Err(format!("expected sequential or per_user, got {other}")),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchMode::Sequential => "sequential",
            DispatchMode::PerUser => "per_user",
        })
    }
}

/// A decoded, non-empty inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from_uid: String,
    pub text: String,
    pub chat_kind: ChatKind,
}

impl InboundMessage {
    pub fn is_control(&self) -> bool {
        self.text.starts_with(CONTROL_PREFIX)
    }
}

/// Counts for one ingestion cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: usize,
    pub control: usize,
    pub empty: usize,
    /// Groups or messages that could not be decoded
    pub malformed: usize,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Why a cycle produced no batch
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("gateway reported error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("expected a list of message groups, got {0}")]
    NotAList(&'static str),
}

#[derive(Debug, Error)]
enum DecodeError {
    #[error("message is not a JSON object with uid/text: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no sender uid")]
    MissingSender,
}

pub struct Poller<S> {
    source: S,
    agent: Arc<Agent>,
    log: Arc<MessageLog>,
    interval: Duration,
    mode: DispatchMode,
}

impl<S: MessageSource> Poller<S> {
    pub fn new(source: S, agent: Arc<Agent>, log: Arc<MessageLog>, config: &IngestConfig) -> Self {
        Self {
            source,
            agent,
            log,
            interval: config.poll_interval,
            mode: config.dispatch_mode,
        }
    }

    /// Poll until `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) {
        tracing::info!(
            interval_ms = %self.interval.as_millis(),
            mode = %self.mode,
            "Starting ingestion loop"
        );

        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                outcome = AssertUnwindSafe(self.poll_once()).catch_unwind() => outcome,
            };

            match outcome {
                Ok(Ok(report)) if !report.is_empty() => {
                    tracing::info!(
                        dispatched = report.dispatched,
                        control = report.control,
                        empty = report.empty,
                        malformed = report.malformed,
                        "Ingestion cycle complete"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(CycleError::Remote { code, message })) if code == TRANSIENT_ERROR_CODE => {
                    tracing::error!(code, message = %message, "Gateway error, retrying");
                }
                Ok(Err(e)) => tracing::error!(error = %e, "Ingestion cycle failed"),
                Err(_) => tracing::error!("Ingestion cycle panicked, continuing"),
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Ingestion loop stopped");
    }

    /// Run one fetch-decode-dispatch cycle.
    pub async fn poll_once(&self) -> Result<CycleReport, CycleError> {
        let items = match self.source.receive().await? {
            GatewayReply::Batch(items) => items,
            GatewayReply::Failure { code, message } => {
                return Err(CycleError::Remote { code, message })
            }
            GatewayReply::Unexpected(kind) => return Err(CycleError::NotAList(kind)),
        };

        let mut report = CycleReport::default();
        let mut pending = Vec::new();
        for message in decode_batch(items, &mut report) {
            self.log.push(&message).await;
            if message.is_control() {
                tracing::debug!(from_uid = %message.from_uid, "Control message recorded");
                report.control += 1;
            } else {
                pending.push(message);
            }
        }

        report.dispatched = pending.len();
        self.dispatch(pending).await;
        Ok(report)
    }

    async fn dispatch(&self, messages: Vec<InboundMessage>) {
        match self.mode {
            DispatchMode::Sequential => {
                for message in messages {
                    handle(&self.agent, &message.from_uid, &message.text).await;
                }
            }
            DispatchMode::PerUser => {
                let mut tasks = JoinSet::new();
                for (uid, texts) in group_by_sender(messages) {
                    let agent = Arc::clone(&self.agent);
                    tasks.spawn(async move {
                        for text in texts {
                            handle(&agent, &uid, &text).await;
                        }
                    });
                }
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Dispatch task failed");
                    }
                }
            }
        }
    }
}

async fn handle(agent: &Agent, uid: &str, text: &str) {
    tracing::info!(from_uid = %uid, "Invoking agent for message");
    agent.invoke(text, uid).await;
}

/// Decode every group and message in a batch, skipping what cannot be decoded.
fn decode_batch(items: Vec<Value>, report: &mut CycleReport) -> Vec<InboundMessage> {
    let mut messages = Vec::new();

    for value in items {
        let item: GroupItem = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(error = %e, "Skipping malformed message group");
                report.malformed += 1;
                continue;
            }
        };
        tracing::debug!(kind = item.kind, uid = %item.uid, count = item.count, "Processing group");

        for entry in &item.message {
            let Some(raw) = entry.as_str() else {
                tracing::error!(entry = %entry, "Message entry is not a string, skipping");
                report.malformed += 1;
                continue;
            };
            match decode_message(raw, &item) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => {
                    tracing::warn!(uid = %item.uid, "Empty message text, skipping");
                    report.empty += 1;
                }
                Err(e) => {
                    tracing::error!(raw = %raw, error = %e, "Failed to decode message");
                    report.malformed += 1;
                }
            }
        }
    }

    messages
}

fn decode_message(raw: &str, item: &GroupItem) -> Result<Option<InboundMessage>, DecodeError> {
    let body: MessageBody = serde_json::from_str(raw)?;
    let text = body.text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    // Direct chats may omit the sender inside the body; the group uid is the sender then.
    let from_uid = if body.uid.is_empty() { &item.uid } else { &body.uid };
    if from_uid.is_empty() {
        return Err(DecodeError::MissingSender);
    }

    Ok(Some(InboundMessage {
        from_uid: from_uid.clone(),
        text: text.to_string(),
        chat_kind: item.chat_kind(),
    }))
}

/// Group texts by sender, keeping first-seen sender order and per-sender order.
fn group_by_sender(messages: Vec<InboundMessage>) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for message in messages {
        match index.get(&message.from_uid) {
            Some(&i) => groups[i].1.push(message.text),
            None => {
                index.insert(message.from_uid.clone(), groups.len());
                groups.push((message.from_uid, vec![message.text]));
            }
        }
    }
    groups
}
