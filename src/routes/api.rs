// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for user token records and anime lists.

use crate::error::{AppError, Result};
use crate::models::anime::{summarize, AnimeView, ListStats, StatsAnime};
use crate::models::{UserTokenRecord, UserTokenUpdate};
use crate::services::TokenStatus;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/register", post(register_user))
        .route("/api/user/update", put(update_user))
        .route("/api/user/{username}/token", get(get_token_status))
        .route("/api/anime/list", get(get_anime_list))
        .route("/api/anime/stats", get(get_anime_stats))
}

/// MAL usernames: 2-16 characters of letters, digits, `_` and `-`.
pub fn validate_username(username: &str) -> std::result::Result<(), ValidationError> {
    let valid_len = (2..=16).contains(&username.chars().count());
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}

fn validated<T: Validate>(input: T) -> Result<T> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(input)
}

// ─── User Records ────────────────────────────────────────────

/// Token record as the browser may see it: no token values.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserSummary {
    pub username: String,
    pub token_type: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub expiry_time: Option<i64>,
    pub authorized: bool,
    pub modified_at: String,
}

impl From<UserTokenRecord> for UserSummary {
    fn from(record: UserTokenRecord) -> Self {
        Self {
            authorized: record.is_authorized(),
            username: record.username,
            token_type: record.token_type,
            expiry_time: record.expiry_time,
            modified_at: record.modified_at,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

/// Register a user with no MAL authorization yet.
async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserSummary>)> {
    let body = validated(body)?;
    let record = state.store.create_user(&body.username).await?;
    tracing::info!(username = %record.username, "User registered");
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Partial token update from the frontend.
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 1, max = 256))]
    pub code_challenge: Option<String>,
    #[validate(length(min = 1, max = 4096))]
    pub access_token: Option<String>,
    #[validate(length(min = 1, max = 4096))]
    pub refresh_token: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub token_type: Option<String>,
    #[validate(range(min = 0))]
    pub expiry_time: Option<i64>,
}

/// Update a user's token fields. Any failure is a 400.
async fn update_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UserUpdateRequest>,
) -> Result<(StatusCode, Json<UserSummary>)> {
    let body = validated(body)?;

    let update = UserTokenUpdate {
        code_challenge: body.code_challenge,
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        token_type: body.token_type,
        expiry_time: body.expiry_time,
        ..Default::default()
    };

    let record = state
        .store
        .update_user(&body.username, &update)
        .await
        .map_err(|e| {
            tracing::warn!(username = %body.username, error = %e, "User update failed");
            AppError::BadRequest(format!("Could not update user {}", body.username))
        })?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

// ─── Token Validity ──────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatusResponse {
    pub status: TokenStatus,
    pub expiry_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Check (and refresh if needed) the user's MAL token.
async fn get_token_status(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<TokenStatusResponse>> {
    let check = state.mal_service.ensure_valid_token(&username).await?;

    let message = match check.status {
        TokenStatus::Valid | TokenStatus::Refreshed => None,
        TokenStatus::NeedsAuthorization => {
            Some("Connect your MyAnimeList account to continue".to_string())
        }
        TokenStatus::RefreshFailed => Some(
            "Could not refresh your MyAnimeList session; please re-authorize".to_string(),
        ),
    };

    Ok(Json(TokenStatusResponse {
        status: check.status,
        expiry_time: check.record.expiry_time,
        message,
    }))
}

// ─── Anime ───────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct UsernameQuery {
    #[validate(custom(function = "validate_username"))]
    username: String,
}

/// The user's list, live from MAL.
async fn get_anime_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Vec<AnimeView>>> {
    let query = validated(query)?;
    let items = state.mal_service.list_anime(&query.username).await?;
    Ok(Json(items.iter().map(AnimeView::from).collect()))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub entries: Vec<StatsAnime>,
    pub summary: ListStats,
}

/// Stats over the locally synced library.
async fn get_anime_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<StatsResponse>> {
    let query = validated(query)?;
    if state.store.get_user(&query.username).await?.is_none() {
        return Err(AppError::NotFound(format!("User {}", query.username)));
    }

    let entries: Vec<StatsAnime> = state
        .store
        .list_library_entries(&query.username)
        .await?
        .iter()
        .map(StatsAnime::from)
        .collect();
    let summary = summarize(&entries);

    Ok(Json(StatsResponse { entries, summary }))
}
