// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MyAnimeList OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::UserTokenUpdate;
use crate::services::pkce;
use crate::time_utils::now_millis;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/mal", get(auth_start))
        .route("/auth/mal/callback", get(auth_callback))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    username: String,
}

/// Start OAuth flow - store a fresh challenge and redirect to MAL.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let record = state
        .store
        .get_user(&params.username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", params.username)))?;

    let verifier = pkce::generate_verifier()?;
    let challenge = pkce::code_challenge(&verifier);
    let oauth_state = pkce::sign_state(
        &record.username,
        now_millis(),
        &state.config.oauth_state_key,
    )?;

    let auth_url = pkce::build_authorize_url(
        &state.config.mal_auth_url,
        &state.config.mal_client_id,
        &oauth_state,
        &challenge,
        state.config.mal_redirect_uri.as_deref(),
    )?;

    // Restarting the flow replaces any pending challenge.
    state
        .store
        .update_user(
            &record.username,
            &UserTokenUpdate {
                code_challenge: Some(challenge),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(
        username = %record.username,
        "Starting OAuth flow, redirecting to MyAnimeList"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, then send the browser back to
/// the frontend with either `authorized=true` or an `error` code.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend_url = state.config.frontend_url.as_str();

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from MyAnimeList");
        return frontend_redirect(frontend_url, &format!("error={}", urlencoding::encode(&error)));
    }

    let username = params.state.as_deref().and_then(|s| {
        pkce::verify_state(s, &state.config.oauth_state_key, now_millis())
    });
    let Some(username) = username else {
        tracing::warn!("Invalid, expired, or tampered state parameter");
        return frontend_redirect(frontend_url, "error=invalid_state");
    };

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return frontend_redirect(frontend_url, "error=missing_code");
    };

    tracing::info!(username = %username, "Exchanging authorization code for tokens");

    match state
        .mal_service
        .complete_authorization(&username, &code)
        .await
    {
        Ok(_) => frontend_redirect(frontend_url, "authorized=true"),
        Err(e) => {
            tracing::warn!(username = %username, error = %e, "Could not generate access token");
            frontend_redirect(frontend_url, "error=could_not_generate_access_token")
        }
    }
}

fn frontend_redirect(frontend_url: &str, query: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/?{}",
        frontend_url.trim_end_matches('/'),
        query
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::response::IntoResponse;

    #[test]
    fn test_frontend_redirect_trims_slash() {
        let response = frontend_redirect("http://localhost:3000/", "authorized=true").into_response();
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://localhost:3000/?authorized=true"
        );
    }
}
