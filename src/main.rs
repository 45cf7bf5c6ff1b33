//! Luffa agent - rock-paper-scissors chatbot for the Luffa messaging gateway
//!
//! Polls the gateway for inbound messages, routes each one through a
//! per-user conversation, and answers either from the game engine or from a
//! generative model. A small HTTP surface exposes direct chat and diagnostics.

mod agent;
mod api;
mod config;
mod envelope;
mod game;
mod gateway;
mod ingest;
mod llm;
mod session;
#[cfg(test)]
mod testing;

use agent::Agent;
use api::{create_router, AppState};
use config::AppConfig;
use game::RandomMoves;
use gateway::{DisabledSink, LuffaClient, MessageSink};
use ingest::{MessageLog, Poller};
use session::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "luffa_agent=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    let llm = llm::build_service(&config.llm);
    tracing::info!(model = %llm.model_id(), "LLM service initialized");

    let luffa = LuffaClient::from_config(&config.gateway)?.map(Arc::new);
    let sink: Arc<dyn MessageSink> = match &luffa {
        Some(client) => Arc::clone(client) as Arc<dyn MessageSink>,
        None => {
            tracing::warn!("LUFFA_ROBOT_SECRET not set. Polling disabled, replies will not be delivered.");
            Arc::new(DisabledSink)
        }
    };

    let sessions = Arc::new(SessionStore::new(config.sessions.capacity));
    let agent = Arc::new(Agent::new(
        sessions.clone(),
        llm,
        sink,
        Arc::new(RandomMoves),
    ));
    let message_log = Arc::new(MessageLog::new(config.ingest.log_capacity));

    let cancel = CancellationToken::new();
    let mut background = Vec::new();

    if let Some(client) = luffa {
        let poller = Poller::new(client, agent.clone(), message_log.clone(), &config.ingest);
        let token = cancel.clone();
        background.push(tokio::spawn(async move { poller.run(&token).await }));
    }

    if config.sessions.idle_ttl.is_zero() {
        tracing::info!("Idle session eviction disabled");
    } else {
        background.push(sessions.spawn_sweeper(config.sessions.idle_ttl, cancel.clone()));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(agent, message_log))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Luffa agent listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    for task in background {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
