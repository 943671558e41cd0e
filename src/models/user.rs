// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User token record for storage.

use serde::{Deserialize, Serialize};

/// Per-user OAuth material (document ID = username).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTokenRecord {
    /// Application username (also used as document ID)
    pub username: String,
    /// PKCE challenge sent with the pending authorization request
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// e.g. "Bearer"
    #[serde(default)]
    pub token_type: Option<String>,
    /// When the access token expires (Unix epoch milliseconds)
    #[serde(default)]
    pub expiry_time: Option<i64>,
    /// When the user registered (ISO 8601)
    pub created_at: String,
    /// Last update of any field (ISO 8601)
    pub modified_at: String,
}

impl UserTokenRecord {
    /// A freshly registered user with no token material.
    pub fn new(username: &str, now: &str) -> Self {
        Self {
            username: username.to_string(),
            code_challenge: None,
            access_token: None,
            refresh_token: None,
            token_type: None,
            expiry_time: None,
            created_at: now.to_string(),
            modified_at: now.to_string(),
        }
    }

    /// Merge a partial update into this record. Last write wins.
    pub fn apply(&mut self, update: &UserTokenUpdate, now: &str) {
        if update.clear_code_challenge {
            self.code_challenge = None;
        }
        if let Some(challenge) = &update.code_challenge {
            self.code_challenge = Some(challenge.clone());
        }
        if let Some(token) = &update.access_token {
            self.access_token = Some(token.clone());
        }
        if let Some(token) = &update.refresh_token {
            self.refresh_token = Some(token.clone());
        }
        if let Some(token_type) = &update.token_type {
            self.token_type = Some(token_type.clone());
        }
        if let Some(expiry) = update.expiry_time {
            self.expiry_time = Some(expiry);
        }
        self.modified_at = now.to_string();
    }

    /// Whether an access token has ever been issued for this user.
    pub fn is_authorized(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Partial update of a [`UserTokenRecord`]. `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTokenUpdate {
    pub code_challenge: Option<String>,
    /// Drop the pending challenge (consumed by a token exchange)
    pub clear_code_challenge: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expiry_time: Option<i64>,
}
