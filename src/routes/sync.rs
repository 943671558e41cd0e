// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! List sync start and progress polling.
//!
//! The frontend polls `/api/sync/progress/{id}` every 500 ms until the
//! status is terminal. A 404 (unknown id, evicted, or the process
//! restarted) also ends polling.

use crate::error::{AppError, Result};
use crate::models::SyncProgressRecord;
use crate::routes::api::validate_username;
use crate::services::ListSyncJob;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync/start", post(start_sync))
        .route("/api/sync/progress/{session_id}", get(get_progress))
}

fn validate_session_id(session_id: &str) -> std::result::Result<(), ValidationError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 64
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_session_id"))
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SyncStartRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    /// Caller-chosen id; generated when absent
    #[validate(custom(function = "validate_session_id"))]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStartResponse {
    pub session_id: String,
}

/// Kick off a list sync in the background.
async fn start_sync(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncStartRequest>,
) -> Result<(StatusCode, Json<SyncStartResponse>)> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Fail fast with a re-authorize prompt rather than a failed session.
    state.mal_service.access_token(&body.username).await?;

    let session_id = body
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Conflict if this id is already running.
    state.progress.start(&session_id, 0)?;

    let job = ListSyncJob {
        mal: state.mal_service.clone(),
        store: state.store.clone(),
        tracker: state.progress.clone(),
        username: body.username.clone(),
        session_id: session_id.clone(),
    };
    tokio::spawn(job.run());

    tracing::info!(username = %body.username, session_id = %session_id, "List sync started");

    Ok((StatusCode::ACCEPTED, Json(SyncStartResponse { session_id })))
}

/// Current progress of a sync session.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SyncProgressRecord>> {
    state
        .progress
        .get_progress(&session_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Sync session {}", session_id)))
}
