// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bulk sync of a user's MAL list into the local library.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{LibraryEntry, MalListItem, ProgressUpdate};
use crate::services::mal::MalService;
use crate::services::progress::SyncProgressTracker;
use crate::time_utils::format_utc_rfc3339;
use std::sync::Arc;

/// How one list item was reconciled with the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Added,
    Updated,
    Skipped,
    Error,
}

impl EntryOutcome {
    fn as_update(self, title: &str) -> ProgressUpdate {
        let mut update = ProgressUpdate {
            processed_items: 1,
            current_item: Some(title.to_string()),
            ..Default::default()
        };
        match self {
            EntryOutcome::Added => update.added_entries = 1,
            EntryOutcome::Updated => update.updated_entries = 1,
            EntryOutcome::Skipped => update.skipped_entries = 1,
            EntryOutcome::Error => update.error_entries = 1,
        }
        update
    }
}

/// One sync run, reporting into the tracker under `session_id`.
pub struct ListSyncJob {
    pub mal: MalService,
    pub store: Arc<dyn Store>,
    pub tracker: SyncProgressTracker,
    pub username: String,
    pub session_id: String,
}

impl ListSyncJob {
    /// Run to completion. The outcome is reported through the tracker;
    /// the caller only needs to spawn this.
    pub async fn run(self) {
        if let Err(e) = self.sync().await {
            tracing::warn!(session_id = %self.session_id, error = %e, "List sync failed");
            let message = if e.requires_reauthorization() {
                "Sync failed: MyAnimeList access was revoked or expired; please re-authorize"
                    .to_string()
            } else {
                format!("Sync failed: {}", e)
            };
            self.tracker.fail(&self.session_id, &message);
        }
    }

    async fn sync(&self) -> Result<(), AppError> {
        let session_id = self.session_id.as_str();
        self.tracker.update(
            session_id,
            &ProgressUpdate {
                message: Some("Fetching list from MyAnimeList".to_string()),
                ..Default::default()
            },
        );

        let items = self.mal.list_anime(&self.username).await?;
        let total = items.len() as u64;
        tracing::info!(username = %self.username, session_id, total, "Syncing anime list");

        self.tracker.update(
            session_id,
            &ProgressUpdate {
                total_items: Some(total),
                message: Some(format!("Syncing {} entries", total)),
                ..Default::default()
            },
        );

        let mut errors = 0u64;
        for item in &items {
            let outcome = self.reconcile(item).await;
            if outcome == EntryOutcome::Error {
                errors += 1;
            }
            self.tracker
                .update(session_id, &outcome.as_update(&item.node.title));
        }

        let message = if errors == 0 {
            format!("Synced {} entries", total)
        } else {
            format!("Synced {} entries, {} failed", total, errors)
        };
        self.tracker.complete(session_id, &message);
        Ok(())
    }

    async fn reconcile(&self, item: &MalListItem) -> EntryOutcome {
        let existing = match self
            .store
            .get_library_entry(&self.username, item.node.id)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(anime_id = item.node.id, error = %e, "Library read failed");
                return EntryOutcome::Error;
            }
        };

        let outcome = match &existing {
            None => EntryOutcome::Added,
            Some(entry) if entry.mal_updated_at == item.list_status.updated_at => {
                return EntryOutcome::Skipped
            }
            Some(_) => EntryOutcome::Updated,
        };

        let now = format_utc_rfc3339(chrono::Utc::now());
        let entry = LibraryEntry::from_list_item(&self.username, item, &now);
        match self.store.upsert_library_entry(&entry).await {
            Ok(()) => outcome,
            Err(e) => {
                tracing::warn!(anime_id = item.node.id, error = %e, "Library write failed");
                EntryOutcome::Error
            }
        }
    }
}
