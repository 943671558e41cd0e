// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MyAnimeList response shapes and the view models derived from them.
//!
//! The MAL structs mirror the v2 API JSON. Everything the frontend sees is a
//! plain DTO produced by a pure mapping function.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

// ─── MAL API shapes ──────────────────────────────────────────

/// One page of `GET /users/@me/animelist`.
#[derive(Debug, Clone, Deserialize)]
pub struct MalListPage {
    pub data: Vec<MalListItem>,
    #[serde(default)]
    pub paging: MalPaging,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MalPaging {
    /// Absolute URL of the next page, absent on the last page
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalListItem {
    pub node: MalAnimeNode,
    pub list_status: MalListStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalAnimeNode {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub main_picture: Option<MalPicture>,
    /// 0 when MAL does not know the episode count yet
    #[serde(default)]
    pub num_episodes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalPicture {
    pub medium: String,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalListStatus {
    pub status: String,
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub num_episodes_watched: u32,
    #[serde(default)]
    pub updated_at: String,
}

/// `GET /anime/{id}?fields=num_episodes,my_list_status`
#[derive(Debug, Clone, Deserialize)]
pub struct MalAnimeDetails {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub num_episodes: u32,
    #[serde(default)]
    pub my_list_status: Option<MalListStatus>,
}

// ─── Stored library ──────────────────────────────────────────

/// Local snapshot of one entry on a user's MAL list.
///
/// Stored at: `library/{username}:{anime_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub username: String,
    pub anime_id: u64,
    pub title: String,
    pub status: String,
    pub score: u8,
    pub num_episodes_watched: u32,
    pub num_episodes: u32,
    #[serde(default)]
    pub picture: Option<String>,
    /// MAL's own `updated_at` for the list entry, used for change detection
    pub mal_updated_at: String,
    /// When this snapshot was written (ISO 8601)
    pub synced_at: String,
}

impl LibraryEntry {
    pub fn document_id(username: &str, anime_id: u64) -> String {
        format!("{}:{}", username, anime_id)
    }

    pub fn from_list_item(username: &str, item: &MalListItem, synced_at: &str) -> Self {
        Self {
            username: username.to_string(),
            anime_id: item.node.id,
            title: item.node.title.clone(),
            status: item.list_status.status.clone(),
            score: item.list_status.score,
            num_episodes_watched: item.list_status.num_episodes_watched,
            num_episodes: item.node.num_episodes,
            picture: item.node.main_picture.as_ref().map(|p| p.medium.clone()),
            mal_updated_at: item.list_status.updated_at.clone(),
            synced_at: synced_at.to_string(),
        }
    }
}

// ─── View models ─────────────────────────────────────────────

/// Row of the anime list page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AnimeView {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub title: String,
    pub picture: Option<String>,
    pub status: String,
    pub score: u8,
    pub episodes_watched: u32,
    /// `None` while the episode count is unknown
    pub total_episodes: Option<u32>,
}

impl From<&MalListItem> for AnimeView {
    fn from(item: &MalListItem) -> Self {
        Self {
            id: item.node.id,
            title: item.node.title.clone(),
            picture: item.node.main_picture.as_ref().map(|p| p.medium.clone()),
            status: item.list_status.status.clone(),
            score: item.list_status.score,
            episodes_watched: item.list_status.num_episodes_watched,
            total_episodes: known_episode_count(item.node.num_episodes),
        }
    }
}

/// Row of the stats page, built from the stored library.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsAnime {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub title: String,
    pub status: String,
    /// 0 means unscored
    pub score: u8,
    pub episodes_watched: u32,
    pub total_episodes: Option<u32>,
}

impl From<&LibraryEntry> for StatsAnime {
    fn from(entry: &LibraryEntry) -> Self {
        Self {
            id: entry.anime_id,
            title: entry.title.clone(),
            status: entry.status.clone(),
            score: entry.score,
            episodes_watched: entry.num_episodes_watched,
            total_episodes: known_episode_count(entry.num_episodes),
        }
    }
}

/// Aggregates over a user's library.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ListStats {
    pub total_entries: u32,
    pub by_status: BTreeMap<String, u32>,
    /// Mean over scored entries only
    pub mean_score: Option<f64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub episodes_watched: u64,
}

/// Summarize stats rows.
pub fn summarize(entries: &[StatsAnime]) -> ListStats {
    let mut by_status = BTreeMap::new();
    let mut score_sum = 0u64;
    let mut scored = 0u32;
    let mut episodes_watched = 0u64;

    for entry in entries {
        *by_status.entry(entry.status.clone()).or_insert(0) += 1;
        if entry.score > 0 {
            score_sum += u64::from(entry.score);
            scored += 1;
        }
        episodes_watched += u64::from(entry.episodes_watched);
    }

    ListStats {
        total_entries: entries.len() as u32,
        by_status,
        mean_score: (scored > 0).then(|| score_sum as f64 / f64::from(scored)),
        episodes_watched,
    }
}

fn known_episode_count(count: u32) -> Option<u32> {
    (count > 0).then_some(count)
}
