// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MyAnimeList API client and token lifecycle.
//!
//! Handles:
//! - Authorization code exchange and refresh against the token endpoint
//! - Deciding whether a stored token is usable, refreshing when it is not
//! - List fetching and list status updates

use crate::config::Config;
use crate::db::Store;
use crate::error::AppError;
use crate::models::anime::{MalAnimeDetails, MalListItem, MalListPage};
use crate::models::{UserTokenRecord, UserTokenUpdate};
use crate::services::http::HttpClient;
use crate::time_utils::{expiry_from_expires_in, now_millis};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Page size for list fetches (MAL maximum is 1000; 100 keeps pages small).
const LIST_PAGE_LIMIT: u32 = 100;

/// Safety valve against a `paging.next` loop.
const MAX_LIST_PAGES: usize = 200;

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds from the moment of the response
    pub expires_in: u64,
}

/// Error body from the token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Low-level MAL client.
#[derive(Clone)]
pub struct MalClient {
    http: HttpClient,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    token_url: String,
    api_url: String,
}

impl MalClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            http: HttpClient::new(
                config.http_timeout,
                config.http_max_attempts,
                config.http_base_backoff,
            )?,
            client_id: config.mal_client_id.clone(),
            client_secret: config.mal_client_secret.clone(),
            redirect_uri: config.mal_redirect_uri.clone(),
            token_url: config.mal_token_url.clone(),
            api_url: config.mal_api_url.trim_end_matches('/').to_string(),
        })
    }

    // ─── Token Endpoint ──────────────────────────────────────────

    /// Exchange an authorization code. Under the `plain` method the verifier
    /// is the challenge that was sent with the authorization request.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AppError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        if let Some(redirect_uri) = &self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }
        // Codes are single-use: a replay after a lost response can only fail.
        self.token_request(&form, false).await
    }

    /// Mint a new access token from a refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        self.token_request(&form, true).await
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
        retry: bool,
    ) -> Result<TokenResponse, AppError> {
        let request = self.http.inner().post(&self.token_url).form(form);
        let response = if retry {
            self.http.send(request).await?
        } else {
            self.http.send_once(request).await?
        };

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<OAuthErrorBody>(&body)
                .map(|e| {
                    let detail = e.hint.or(e.message).unwrap_or_default();
                    if detail.is_empty() {
                        e.error
                    } else {
                        format!("{}: {}", e.error, detail)
                    }
                })
                .unwrap_or_else(|_| format!("HTTP {}", status));
            tracing::warn!(status = %status, reason = %reason, "MAL token request rejected");
            return Err(AppError::ProviderRejected(reason));
        }
        if !status.is_success() {
            tracing::error!(status = %status, "MAL token endpoint failed");
            return Err(AppError::MalApi(format!(
                "Token endpoint returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MalApi(format!("Failed to parse token response: {}", e)))
    }

    // ─── REST API ────────────────────────────────────────────────

    /// Fetch every page of the authenticated user's anime list.
    pub async fn list_anime(&self, access_token: &str) -> Result<Vec<MalListItem>, AppError> {
        let mut items = Vec::new();
        let mut next = Some(format!(
            "{}/users/@me/animelist?fields=list_status,num_episodes&limit={}&nsfw=true",
            self.api_url, LIST_PAGE_LIMIT
        ));

        for _ in 0..MAX_LIST_PAGES {
            let Some(url) = next.take() else {
                return Ok(items);
            };
            let page: MalListPage = self.get_json(&url, access_token).await?;
            items.extend(page.data);
            next = page.paging.next;
        }

        tracing::warn!(pages = MAX_LIST_PAGES, "Anime list paging truncated");
        Ok(items)
    }

    /// Episode count and the user's list status for one anime.
    pub async fn get_anime(
        &self,
        access_token: &str,
        anime_id: u64,
    ) -> Result<MalAnimeDetails, AppError> {
        let url = format!(
            "{}/anime/{}?fields=num_episodes,my_list_status",
            self.api_url, anime_id
        );
        self.get_json(&url, access_token).await
    }

    /// Update the user's list entry for one anime.
    pub async fn update_list_status(
        &self,
        access_token: &str,
        anime_id: u64,
        status: &str,
        num_watched_episodes: u32,
    ) -> Result<(), AppError> {
        let url = format!("{}/anime/{}/my_list_status", self.api_url, anime_id);
        let watched = num_watched_episodes.to_string();
        let response = self
            .http
            .send(
                self.http
                    .inner()
                    .patch(&url)
                    .bearer_auth(access_token)
                    .form(&[("status", status), ("num_watched_episodes", watched.as_str())]),
            )
            .await?;

        check_api_status(response).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .send(self.http.inner().get(url).bearer_auth(access_token))
            .await?;

        check_api_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::MalApi(format!("JSON parse error: {}", e)))
    }
}

/// Map API failures; 401 means the token is no longer accepted.
async fn check_api_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 401 {
        return Err(AppError::ReauthorizationRequired(
            "MyAnimeList rejected the access token".to_string(),
        ));
    }
    if status.as_u16() == 404 {
        return Err(AppError::NotFound("Anime not found on MyAnimeList".to_string()));
    }
    Err(AppError::MalApi(format!("HTTP {}: {}", status, body)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Token validity
// ─────────────────────────────────────────────────────────────────────────────

/// What a stored record allows, before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAssessment {
    /// No access token, or expired with nothing to refresh it with
    NeedsAuthorization,
    Valid,
    /// Expired, but a refresh token is available
    NeedsRefresh,
}

/// Classify `record` at `now_ms`. A token is valid strictly before its
/// expiry; a token with no recorded expiry is treated as expired.
pub fn assess_token(record: &UserTokenRecord, now_ms: i64) -> TokenAssessment {
    if record.access_token.is_none() {
        return TokenAssessment::NeedsAuthorization;
    }
    match record.expiry_time {
        Some(expiry) if now_ms < expiry => TokenAssessment::Valid,
        _ if record.refresh_token.is_some() => TokenAssessment::NeedsRefresh,
        _ => TokenAssessment::NeedsAuthorization,
    }
}

/// Outcome of [`MalService::ensure_valid_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Valid,
    Refreshed,
    NeedsAuthorization,
    /// The refresh grant failed; stale tokens are kept
    RefreshFailed,
}

impl TokenStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, TokenStatus::Valid | TokenStatus::Refreshed)
    }
}

/// Checker result plus the record as it stands afterwards.
#[derive(Debug, Clone)]
pub struct TokenCheck {
    pub status: TokenStatus,
    pub record: UserTokenRecord,
}

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Result of reporting a watched episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchUpdate {
    Updated { status: String, watched: u32 },
    AlreadyWatched { watched: u32 },
}

/// High-level MAL service: token lifecycle on top of [`MalClient`].
#[derive(Clone)]
pub struct MalService {
    client: MalClient,
    store: Arc<dyn Store>,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl MalService {
    pub fn new(client: MalClient, store: Arc<dyn Store>, refresh_locks: RefreshLocks) -> Self {
        Self {
            client,
            store,
            refresh_locks,
        }
    }

    pub fn client(&self) -> &MalClient {
        &self.client
    }

    // ─── OAuth Callback Handling ─────────────────────────────────

    /// Exchange `code` for tokens and persist them for `username`.
    ///
    /// Nothing is written unless the exchange succeeds. The pending
    /// challenge is consumed on success.
    pub async fn complete_authorization(
        &self,
        username: &str,
        code: &str,
    ) -> Result<UserTokenRecord, AppError> {
        let record = self
            .store
            .get_user(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))?;

        let challenge = record.code_challenge.as_deref().ok_or_else(|| {
            AppError::BadRequest("No authorization in progress for this user".to_string())
        })?;

        let tokens = self.client.exchange_code(code, challenge).await?;
        let issued_at = now_millis();

        let update = UserTokenUpdate {
            clear_code_challenge: true,
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            token_type: Some(tokens.token_type),
            expiry_time: Some(expiry_from_expires_in(issued_at, tokens.expires_in)),
            ..Default::default()
        };
        let record = self.store.update_user(username, &update).await?;

        tracing::info!(username, expiry_time = ?record.expiry_time, "MAL authorization stored");
        Ok(record)
    }

    // ─── Token Management ────────────────────────────────────────

    /// Decide whether `username` has a usable token, refreshing if needed.
    ///
    /// 1. Assess the stored record (no I/O beyond the store read)
    /// 2. If a refresh is needed, take the per-user lock
    /// 3. Re-read and re-assess; another task may have refreshed already
    /// 4. Refresh, and persist the new tokens only on success
    pub async fn ensure_valid_token(&self, username: &str) -> Result<TokenCheck, AppError> {
        let record = self.load_user(username).await?;

        match assess_token(&record, now_millis()) {
            TokenAssessment::Valid => {
                return Ok(TokenCheck {
                    status: TokenStatus::Valid,
                    record,
                })
            }
            TokenAssessment::NeedsAuthorization => {
                return Ok(TokenCheck {
                    status: TokenStatus::NeedsAuthorization,
                    record,
                })
            }
            TokenAssessment::NeedsRefresh => {}
        }

        let lock = self
            .refresh_locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let record = self.load_user(username).await?;
        let refresh_token = match assess_token(&record, now_millis()) {
            TokenAssessment::Valid => {
                return Ok(TokenCheck {
                    status: TokenStatus::Refreshed,
                    record,
                })
            }
            TokenAssessment::NeedsAuthorization => {
                return Ok(TokenCheck {
                    status: TokenStatus::NeedsAuthorization,
                    record,
                })
            }
            TokenAssessment::NeedsRefresh => match record.refresh_token.clone() {
                Some(token) => token,
                None => {
                    return Ok(TokenCheck {
                        status: TokenStatus::NeedsAuthorization,
                        record,
                    })
                }
            },
        };

        tracing::info!(username, "Access token expired, refreshing");

        let tokens = match self.client.refresh_token(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(username, error = %e, "Token refresh failed, re-authorization needed");
                return Ok(TokenCheck {
                    status: TokenStatus::RefreshFailed,
                    record,
                });
            }
        };

        let update = UserTokenUpdate {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            token_type: Some(tokens.token_type),
            expiry_time: Some(expiry_from_expires_in(now_millis(), tokens.expires_in)),
            ..Default::default()
        };
        let record = self.store.update_user(username, &update).await?;

        tracing::info!(username, "Token refreshed");
        Ok(TokenCheck {
            status: TokenStatus::Refreshed,
            record,
        })
    }

    /// A usable access token, or `ReauthorizationRequired`.
    pub async fn access_token(&self, username: &str) -> Result<String, AppError> {
        let check = self.ensure_valid_token(username).await?;
        match (check.status.is_usable(), check.record.access_token) {
            (true, Some(token)) => Ok(token),
            _ => Err(AppError::ReauthorizationRequired(format!(
                "No usable MyAnimeList token for {}",
                username
            ))),
        }
    }

    async fn load_user(&self, username: &str) -> Result<UserTokenRecord, AppError> {
        self.store
            .get_user(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))
    }

    // ─── API Wrappers ────────────────────────────────────────────

    /// Every entry on the user's MAL list.
    pub async fn list_anime(&self, username: &str) -> Result<Vec<MalListItem>, AppError> {
        let access_token = self.access_token(username).await?;
        self.client.list_anime(&access_token).await
    }

    /// Record that `episode` of `anime_id` was watched to the end.
    ///
    /// Never moves the watched count backwards.
    pub async fn record_episode_watched(
        &self,
        username: &str,
        anime_id: u64,
        episode: u32,
    ) -> Result<WatchUpdate, AppError> {
        let access_token = self.access_token(username).await?;
        let anime = self.client.get_anime(&access_token, anime_id).await?;

        let watched = anime
            .my_list_status
            .as_ref()
            .map(|s| s.num_episodes_watched)
            .unwrap_or(0);
        if episode <= watched {
            return Ok(WatchUpdate::AlreadyWatched { watched });
        }

        let status = if anime.num_episodes > 0 && episode >= anime.num_episodes {
            "completed"
        } else {
            "watching"
        };
        let episode = if anime.num_episodes > 0 {
            episode.min(anime.num_episodes)
        } else {
            episode
        };

        self.client
            .update_list_status(&access_token, anime_id, status, episode)
            .await?;

        tracing::info!(username, anime_id, episode, status, "MAL list status updated");
        Ok(WatchUpdate::Updated {
            status: status.to_string(),
            watched: episode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(access: bool, refresh: bool, expiry: Option<i64>) -> UserTokenRecord {
        let mut record = UserTokenRecord::new("alice", "t0");
        record.access_token = access.then(|| "access".to_string());
        record.refresh_token = refresh.then(|| "refresh".to_string());
        record.expiry_time = expiry;
        record
    }

    #[test]
    fn test_assess_without_access_token() {
        assert_eq!(
            assess_token(&record(false, true, Some(i64::MAX)), 0),
            TokenAssessment::NeedsAuthorization
        );
    }

    #[test]
    fn test_assess_valid_until_expiry() {
        let r = record(true, false, Some(1_000));
        assert_eq!(assess_token(&r, 999), TokenAssessment::Valid);
        assert_eq!(
            assess_token(&r, 1_000),
            TokenAssessment::NeedsAuthorization
        );
    }

    #[test]
    fn test_assess_expired_with_refresh_token() {
        assert_eq!(
            assess_token(&record(true, true, Some(1_000)), 2_000),
            TokenAssessment::NeedsRefresh
        );
    }

    #[test]
    fn test_assess_missing_expiry_is_expired() {
        assert_eq!(
            assess_token(&record(true, true, None), 0),
            TokenAssessment::NeedsRefresh
        );
    }

    #[test]
    fn test_token_status_serialization() {
        assert_eq!(
            serde_json::to_value(TokenStatus::NeedsAuthorization).unwrap(),
            "needs_authorization"
        );
        assert!(TokenStatus::Refreshed.is_usable());
        assert!(!TokenStatus::RefreshFailed.is_usable());
    }
}
