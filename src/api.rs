//! HTTP API: direct chat plus a read-only diagnostic view

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::agent::Agent;
use crate::ingest::MessageLog;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub message_log: Arc<MessageLog>,
}

impl AppState {
    pub fn new(agent: Arc<Agent>, message_log: Arc<MessageLog>) -> Self {
        Self { agent, message_log }
    }
}
