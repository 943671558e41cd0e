// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for tests and `STORE_BACKEND=memory`.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{LibraryEntry, UserTokenRecord, UserTokenUpdate};
use crate::time_utils::format_utc_rfc3339;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Store backed by concurrent hash maps. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, UserTokenRecord>>,
    library: Arc<DashMap<String, LibraryEntry>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryDb {
    async fn create_user(&self, username: &str) -> Result<UserTokenRecord, AppError> {
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "User {} already registered",
                username
            ))),
            Entry::Vacant(slot) => {
                let now = format_utc_rfc3339(chrono::Utc::now());
                let record = UserTokenRecord::new(username, &now);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserTokenRecord>, AppError> {
        Ok(self.users.get(username).map(|r| r.clone()))
    }

    async fn update_user(
        &self,
        username: &str,
        update: &UserTokenUpdate,
    ) -> Result<UserTokenRecord, AppError> {
        let mut record = self
            .users
            .get_mut(username)
            .ok_or_else(|| AppError::NotFound(format!("User {}", username)))?;
        let now = format_utc_rfc3339(chrono::Utc::now());
        record.apply(update, &now);
        Ok(record.clone())
    }

    async fn get_library_entry(
        &self,
        username: &str,
        anime_id: u64,
    ) -> Result<Option<LibraryEntry>, AppError> {
        Ok(self
            .library
            .get(&LibraryEntry::document_id(username, anime_id))
            .map(|e| e.clone()))
    }

    async fn upsert_library_entry(&self, entry: &LibraryEntry) -> Result<(), AppError> {
        self.library.insert(
            LibraryEntry::document_id(&entry.username, entry.anime_id),
            entry.clone(),
        );
        Ok(())
    }

    async fn list_library_entries(&self, username: &str) -> Result<Vec<LibraryEntry>, AppError> {
        let mut entries: Vec<LibraryEntry> = self
            .library
            .iter()
            .filter(|e| e.username == username)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(entries)
    }
}
