// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paisen: MyAnimeList companion backend
//!
//! This crate provides the MAL OAuth (PKCE) flow, the stored token
//! lifecycle, list sync with pollable progress, and a Jellyfin hook that
//! marks watched episodes on MAL.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use error::AppError;
use services::{MalClient, MalService, SyncProgressTracker};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub mal_service: MalService,
    pub progress: SyncProgressTracker,
}

impl AppState {
    /// Wire services over `store` as described by `config`.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let client = MalClient::new(&config)?;
        let refresh_locks = Arc::new(dashmap::DashMap::new());
        let mal_service = MalService::new(client, store.clone(), refresh_locks);
        let progress =
            SyncProgressTracker::new(config.progress_retention, config.progress_stale_after);

        Ok(Self {
            config,
            store,
            mal_service,
            progress,
        })
    }
}
