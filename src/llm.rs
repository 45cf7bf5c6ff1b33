//! Generative-AI provider abstraction
//!
//! The rest of the service only sees `LlmService`: an opaque text completion
//! function that takes a prompt plus a system instruction.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::{GeminiModel, GeminiService};
pub use types::*;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    end_turn = response.end_turn,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    retry_after = ?e.retry_after,
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Stand-in used when no API key is configured; every request fails with `Auth`.
pub struct UnconfiguredService;

#[async_trait]
impl LlmService for UnconfiguredService {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::auth("No GEMINI_API_KEY or LLM_GATEWAY configured"))
    }

    fn model_id(&self) -> &str {
        "unconfigured"
    }
}

/// Build the service described by the configuration, wrapped with logging.
pub fn build_service(config: &LlmConfig) -> Arc<dyn LlmService> {
    let api_key = match (&config.api_key, &config.gateway) {
        (Some(key), _) if !key.is_empty() => key.clone(),
        (_, Some(_)) => String::new(),
        _ => {
            tracing::warn!("No LLM API key configured; fallback replies will apologise");
            return Arc::new(UnconfiguredService);
        }
    };

    match GeminiService::new(api_key, config.model, config.gateway.as_deref()) {
        Ok(service) => Arc::new(LoggingService::new(Arc::new(service))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Gemini client");
            Arc::new(UnconfiguredService)
        }
    }
}
