// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod http;
pub mod mal;
pub mod pkce;
pub mod progress;
pub mod sync;

pub use http::HttpClient;
pub use mal::{MalClient, MalService, TokenCheck, TokenStatus};
pub use progress::SyncProgressTracker;
pub use sync::ListSyncJob;
