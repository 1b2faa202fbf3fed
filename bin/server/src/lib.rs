//! spectrum-compass HTTP server.
//!
//! Exposes the conversation workflow as a small JSON API for a chat
//! front end: onboarding, chatting, suggestion chips and reset.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::ServerConfig;
use error::StartupError;
use spectrum_compass_core::Result;
use std::sync::Arc;

/// Builds the application and serves it until interrupted.
///
/// # Errors
///
/// Returns an error if startup fails or the server stops abnormally.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let state = Arc::new(state::AppState::from_config(&config)?);
    state::spawn_session_sweeper(Arc::clone(&state));

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: config.bind_addr.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
