// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod anime;
pub mod progress;
pub mod user;

pub use anime::{AnimeView, LibraryEntry, ListStats, MalListItem, StatsAnime};
pub use progress::{ProgressUpdate, SyncProgressRecord, SyncStatus};
pub use user::{UserTokenRecord, UserTokenUpdate};
