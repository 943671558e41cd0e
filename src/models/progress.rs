// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress state of a running list sync, as served to polling clients.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SyncStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    /// Clients stop polling once a terminal status is reached.
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

/// Snapshot of one sync session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncProgressRecord {
    pub session_id: String,
    pub status: SyncStatus,
    pub percentage: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub processed_items: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_items: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub added_entries: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub updated_entries: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub error_entries: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub skipped_entries: u64,
    pub current_item: Option<String>,
    pub message: Option<String>,
}

impl SyncProgressRecord {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            status: SyncStatus::Idle,
            percentage: 0,
            processed_items: 0,
            total_items: 0,
            added_entries: 0,
            updated_entries: 0,
            error_entries: 0,
            skipped_entries: 0,
            current_item: None,
            message: None,
        }
    }

    /// Apply a delta: counters add, everything else replaces.
    ///
    /// Keeps `processed_items <= total_items` once the total is known and
    /// re-derives `percentage`.
    /// Reaching `total_items` (when non-zero) completes the run.
    pub fn apply(&mut self, update: &ProgressUpdate) {
        if let Some(total) = update.total_items {
            self.total_items = total;
        }
        self.processed_items = self.processed_items.saturating_add(update.processed_items);
        // Progress reported before the total is known is kept as-is.
        if self.total_items > 0 {
            self.processed_items = self.processed_items.min(self.total_items);
        }
        self.added_entries = self.added_entries.saturating_add(update.added_entries);
        self.updated_entries = self.updated_entries.saturating_add(update.updated_entries);
        self.error_entries = self.error_entries.saturating_add(update.error_entries);
        self.skipped_entries = self.skipped_entries.saturating_add(update.skipped_entries);
        if let Some(item) = &update.current_item {
            self.current_item = Some(item.clone());
        }
        if let Some(message) = &update.message {
            self.message = Some(message.clone());
        }

        self.percentage = percentage(self.processed_items, self.total_items);
        if self.total_items > 0 && self.processed_items == self.total_items {
            self.status = SyncStatus::Completed;
        }
    }
}

/// Delta reported by a sync job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Replaces the total once the job knows it
    pub total_items: Option<u64>,
    pub processed_items: u64,
    pub added_entries: u64,
    pub updated_entries: u64,
    pub error_entries: u64,
    pub skipped_entries: u64,
    pub current_item: Option<String>,
    pub message: Option<String>,
}

/// `round(100 * processed / total)`, 0 while the total is unknown.
pub fn percentage(processed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let processed = u128::from(processed.min(total));
    let total = u128::from(total);
    ((200 * processed + total) / (2 * total)) as u32
}
