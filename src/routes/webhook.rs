// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Jellyfin playback events.
//!
//! Configured through the Jellyfin webhook plugin, which sends its
//! template values as strings ("True", "3") as often as typed JSON.

use crate::error::AppError;
use crate::services::mal::WatchUpdate;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/jellyfin/{secret}", post(handle_event))
}

/// Jellyfin webhook payload (the subset we act on).
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct JellyfinEvent {
    #[serde(rename = "NotificationType")]
    notification_type: String,
    #[serde(rename = "ItemType")]
    item_type: String,
    #[serde(rename = "NotificationUsername")]
    username: String,
    #[serde(rename = "SeriesName")]
    series_name: Option<String>,
    #[serde(rename = "EpisodeNumber", deserialize_with = "lenient_u32")]
    episode_number: Option<u32>,
    #[serde(rename = "Provider_myanimelist", deserialize_with = "lenient_u64")]
    mal_id: Option<u64>,
    #[serde(rename = "PlayedToCompletion", deserialize_with = "lenient_bool")]
    played_to_completion: bool,
}

impl JellyfinEvent {
    /// `(mal_id, episode)` if this event is a finished episode we can map.
    fn watched_episode(&self) -> Option<(u64, u32)> {
        if self.notification_type != "PlaybackStop"
            || self.item_type != "Episode"
            || !self.played_to_completion
        {
            return None;
        }
        match (self.mal_id, self.episode_number) {
            (Some(id), Some(ep)) if ep > 0 => Some((id, ep)),
            _ => None,
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
enum WebhookAction {
    Updated { status: String, watched: u32 },
    AlreadyWatched { watched: u32 },
    Ignored,
}

impl From<WatchUpdate> for WebhookAction {
    fn from(update: WatchUpdate) -> Self {
        match update {
            WatchUpdate::Updated { status, watched } => WebhookAction::Updated { status, watched },
            WatchUpdate::AlreadyWatched { watched } => WebhookAction::AlreadyWatched { watched },
        }
    }
}

fn secret_matches(expected: Option<&str>, provided: &str) -> bool {
    match expected {
        Some(expected) => bool::from(expected.as_bytes().ct_eq(provided.as_bytes())),
        None => false,
    }
}

/// Handle an incoming Jellyfin event (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Path(secret): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    if !secret_matches(state.config.jellyfin_webhook_secret.as_deref(), &secret) {
        tracing::warn!("Security Alert: Jellyfin webhook secret mismatch");
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let event: JellyfinEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Jellyfin event");
            return Ok(Json(WebhookAction::Ignored).into_response());
        }
    };

    let Some((mal_id, episode)) = event.watched_episode() else {
        tracing::debug!(
            notification_type = %event.notification_type,
            item_type = %event.item_type,
            "Ignoring Jellyfin event"
        );
        return Ok(Json(WebhookAction::Ignored).into_response());
    };

    let username = state.config.paisen_username_for(&event.username);
    tracing::info!(
        username,
        mal_id,
        episode,
        series = event.series_name.as_deref().unwrap_or(""),
        "Jellyfin reported finished episode"
    );

    let update = state
        .mal_service
        .record_episode_watched(username, mal_id, episode)
        .await?;

    Ok(Json(WebhookAction::from(update)).into_response())
}

// ─── Lenient field parsing ───────────────────────────────────────

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(lenient_u64(deserializer)?.and_then(|n| u32::try_from(n).ok()))
}
