//! HTTP API server (Axum) over the retrieval engine.
//!
//! Provides document ingestion, semantic search, collection stats, drift
//! suite runs, and health monitoring.

pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::Router;
use rag_core::RagConfig;
use rag_engine::RetrievalEngine;
use state::AppState;
use std::sync::Arc;

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::document_routes())
        .merge(routes::drift_routes())
        .with_state(state)
}

/// Build the engine from configuration and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: RagConfig) -> anyhow::Result<()> {
    let engine = Arc::new(RetrievalEngine::from_config(config.engine.clone())?);
    let app = app_with_state(AppState::new(engine, config.drift.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(
        %addr,
        db_type = %config.engine.db_type,
        collection = %config.engine.collection_name,
        "starting rag-server"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
