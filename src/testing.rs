//! Mock collaborators for tests
//!
//! These mocks let the agent and ingestion loop run without network I/O.

use crate::game::{Move, MoveSource};
use crate::gateway::{GatewayError, GatewayReply, GroupItem, MessageSink, MessageSource};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Gateway mocks
// ============================================================================

/// Message source that replays queued fetch results, then empty batches
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Result<GatewayReply, GatewayError>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn queue(&self, reply: Result<GatewayReply, GatewayError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_batch(&self, items: Vec<GroupItem>) {
        let items = items
            .into_iter()
            .map(|item| serde_json::to_value(item).unwrap())
            .collect();
        self.queue(Ok(GatewayReply::Batch(items)));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn receive(&self) -> Result<GatewayReply, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(GatewayReply::Batch(Vec::new())))
    }
}

/// Sink that records deliveries and can be told to fail
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, uid: &str, text: &str) -> Result<(), GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("mock delivery failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((uid.to_string(), text.to_string()));
        Ok(())
    }
}

// ============================================================================
// Move source
// ============================================================================

/// Cycles through a fixed list of moves (rock when empty)
pub struct ScriptedMoves {
    moves: Vec<Move>,
    next: AtomicUsize,
}

impl ScriptedMoves {
    pub fn new(moves: impl IntoIterator<Item = Move>) -> Self {
        Self {
            moves: moves.into_iter().collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl MoveSource for ScriptedMoves {
    fn next_move(&self) -> Move {
        if self.moves.is_empty() {
            return Move::Rock;
        }
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.moves[i % self.moves.len()]
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Raw message string as the gateway encodes it
pub fn raw_message(uid: &str, text: &str) -> String {
    json!({ "uid": uid, "text": text }).to_string()
}

pub fn group_item(uid: &str, messages: Vec<String>) -> GroupItem {
    GroupItem {
        kind: 0,
        uid: uid.to_string(),
        count: u32::try_from(messages.len()).unwrap(),
        message: messages.into_iter().map(Value::String).collect(),
    }
}
