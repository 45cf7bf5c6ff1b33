//! Messaging gateway collaborators
//!
//! The ingestion loop pulls batches from a `MessageSource`; replies go out
//! through a `MessageSink`. Both are traits so tests can script them.

mod luffa;
mod types;

pub use luffa::LuffaClient;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("gateway response is not JSON: {0}")]
    Decode(String),
    #[error("gateway is not configured (set LUFFA_ROBOT_SECRET)")]
    NotConfigured,
}

/// Source of inbound message batches
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch one batch
    async fn receive(&self) -> Result<GatewayReply, GatewayError>;
}

/// Outbound delivery of reply text to a user
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, uid: &str, text: &str) -> Result<(), GatewayError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Arc<T> {
    async fn receive(&self) -> Result<GatewayReply, GatewayError> {
        (**self).receive().await
    }
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for Arc<T> {
    async fn send(&self, uid: &str, text: &str) -> Result<(), GatewayError> {
        (**self).send(uid, text).await
    }
}

/// Sink used when no gateway secret is configured
pub struct DisabledSink;

#[async_trait]
impl MessageSink for DisabledSink {
    async fn send(&self, _uid: &str, _text: &str) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
