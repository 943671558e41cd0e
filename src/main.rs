// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paisen API Server

use paisen::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryDb, Store},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROGRESS_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Paisen API");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => {
            let project_id = config
                .gcp_project_id
                .as_deref()
                .ok_or("GCP_PROJECT_ID is required for the Firestore backend")?;
            let db = FirestoreDb::new(project_id).await?;
            tracing::info!(project = %project_id, "Firestore store initialized");
            Arc::new(db)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryDb::default())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store)?);
    state.progress.spawn_sweeper(PROGRESS_SWEEP_INTERVAL);

    // Build router
    let app = paisen::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,paisen=debug"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
