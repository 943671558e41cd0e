// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (token records, keyed by username)
//! - Library (per-user snapshots of MAL list entries)

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{LibraryEntry, UserTokenRecord, UserTokenUpdate};
use crate::time_utils::format_utc_rfc3339;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Connect to the emulator with a dummy unsigned token.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self { client })
    }

    async fn put_user(&self, record: &UserTokenRecord) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&record.username)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn create_user(&self, username: &str) -> Result<UserTokenRecord, AppError> {
        if self.get_user(username).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "User {} already registered",
                username
            )));
        }

        let now = format_utc_rfc3339(chrono::Utc::now());
        let record = UserTokenRecord::new(username, &now);
        self.put_user(&record).await?;
        Ok(record)
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserTokenRecord>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(username)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read-modify-write without a transaction: concurrent updates for the
    /// same user resolve last-write-wins.
    async fn update_user(
        &self,
        username: &str,
        update: &UserTokenUpdate,
    ) -> Result<UserTokenRecord, AppError> {
        let mut record = self
            .get_user(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))?;

        record.apply(update, &format_utc_rfc3339(chrono::Utc::now()));
        self.put_user(&record).await?;
        Ok(record)
    }

    // ─── Library Operations ──────────────────────────────────────

    async fn get_library_entry(
        &self,
        username: &str,
        anime_id: u64,
    ) -> Result<Option<LibraryEntry>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::LIBRARY)
            .obj()
            .one(&LibraryEntry::document_id(username, anime_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_library_entry(&self, entry: &LibraryEntry) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::LIBRARY)
            .document_id(LibraryEntry::document_id(&entry.username, entry.anime_id))
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_library_entries(&self, username: &str) -> Result<Vec<LibraryEntry>, AppError> {
        let username = username.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::LIBRARY)
            .filter(move |q| q.for_all([q.field("username").eq(username.clone())]))
            .order_by([("title", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
