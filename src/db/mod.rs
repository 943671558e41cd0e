// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`Store`] is the seam between handlers and persistence. Production uses
//! [`FirestoreDb`]; tests and local development use [`MemoryDb`].

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{LibraryEntry, UserTokenRecord, UserTokenUpdate};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Library snapshots (keyed by `{username}:{anime_id}`)
    pub const LIBRARY: &str = "library";
}

/// Persistence operations used by the services.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ─── Token Store ─────────────────────────────────────────

    /// Register a user with no token material.
    async fn create_user(&self, username: &str) -> Result<UserTokenRecord, AppError>;

    async fn get_user(&self, username: &str) -> Result<Option<UserTokenRecord>, AppError>;

    /// Merge `update` into the stored record (last write wins) and stamp
    /// `modified_at`. Fails with `NotFound` for unknown users.
    async fn update_user(
        &self,
        username: &str,
        update: &UserTokenUpdate,
    ) -> Result<UserTokenRecord, AppError>;

    // ─── Library ─────────────────────────────────────────────

    async fn get_library_entry(
        &self,
        username: &str,
        anime_id: u64,
    ) -> Result<Option<LibraryEntry>, AppError>;

    async fn upsert_library_entry(&self, entry: &LibraryEntry) -> Result<(), AppError>;

    async fn list_library_entries(&self, username: &str) -> Result<Vec<LibraryEntry>, AppError>;
}
