//! HTTP request handlers

use super::types::{ChatRequest, ChatResponse, ErrorResponse, HealthResponse};
use super::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    tracing::info!(session_id = %req.session_id, "Received chat request");

    let text = req.message.trim();
    if text.is_empty() {
        tracing::warn!(session_id = %req.session_id, "Empty message received");
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let envelope = state.agent.invoke(text, &req.session_id).await;

    Ok(Json(ChatResponse {
        response: envelope.message,
        session_id: req.session_id,
    }))
}

// ============================================================
// Diagnostics
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message_queue: state.message_log.snapshot().await,
        sessions: state.agent.sessions().len().await,
    })
}

async fn get_version() -> &'static str {
    concat!("luffa-agent ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
