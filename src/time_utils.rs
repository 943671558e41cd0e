// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and token expiry arithmetic.
//!
//! Token expiry is always stored as an absolute Unix timestamp in
//! milliseconds. Providers report lifetimes as a relative `expires_in` in
//! seconds, so every conversion goes through [`expiry_from_expires_in`].

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry (epoch ms) for a token issued at `issued_at_ms` that lives
/// for `expires_in_secs` seconds.
pub fn expiry_from_expires_in(issued_at_ms: i64, expires_in_secs: u64) -> i64 {
    let lifetime_ms = i64::try_from(expires_in_secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    issued_at_ms.saturating_add(lifetime_ms)
}
