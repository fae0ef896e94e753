//! HTTP server setup and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::upstream::Upstream;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::{Error, Result};
use crate::persona;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub upstream: Arc<Upstream>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the conversation store and upstream caller described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        // Per-request timeouts come from the upstream config.
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let mut store = ConversationStore::new(config.history.trim_policy())
            .with_limits(config.history.session_limits());
        if let Some(seed) = persona::seed_prompt(&config.persona)? {
            store = store.with_seed(seed);
        }

        let upstream = Upstream::new(http_client, &config.upstream);

        Ok(Self {
            store: Arc::new(store),
            upstream: Arc::new(upstream),
            config: Arc::new(config),
        })
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .route("/session", get(handlers::new_session))
        .fallback(handlers::not_found)
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let state = AppState::from_config(config)?;

    tracing::info!(
        upstream = %state.config.upstream.name,
        url = %state.config.upstream.url,
        strategy = state.config.upstream.strategy.as_str(),
        trim = ?state.store.policy(),
        "Configured upstream"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting chatrelay server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
