//! chat-hub server entry point.
//!
//! Starts the Axum HTTP server with the login, health and WebSocket
//! endpoints, plus the token retention sweep.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chat_hub::app::build_app;
use chat_hub::app_state::AppState;
use chat_hub::config::{HubConfig, LogFormat};
use chat_hub::domain::TokenStore;
use chat_hub::ws::{EventRouter, SessionRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = HubConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting chat-hub");

    let shutdown = CancellationToken::new();

    // Token store and its retention sweep
    let tokens = TokenStore::new(config.token_ttl);
    let sweeper = tokens.spawn_sweeper(config.token_sweep_interval, shutdown.clone());

    // Session registry
    let registry = Arc::new(SessionRegistry::new(
        tokens,
        EventRouter::with_default_handlers(),
        config.session_settings(),
    ));

    // Build application state
    let app_state = AppState::new(
        Arc::clone(&registry),
        config.credentials(),
        config.allowed_origins.clone(),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let signal = shutdown.clone();
    let closing = Arc::clone(&registry);
    axum::serve(listener, build_app(app_state))
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
            signal.cancel();
            let closed = closing.close_all().await;
            tracing::info!(closed, "sessions closed");
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;
    tracing::info!("chat-hub stopped");

    Ok(())
}
