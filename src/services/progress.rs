// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory registry of list-sync progress, polled by the frontend.
//!
//! Records are not durable: after a restart every session id is unknown and
//! polling clients get a 404, which tells them to stop.
//!
//! Eviction:
//! - a completed/failed record stays readable for `retention`, then goes;
//! - an idle/running record that has not been touched for `stale_after` is
//!   assumed abandoned and goes.
//!
//! Both rules run lazily on read and from [`SyncProgressTracker::spawn_sweeper`].

use crate::error::AppError;
use crate::models::{ProgressUpdate, SyncProgressRecord, SyncStatus};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct TrackedProgress {
    record: SyncProgressRecord,
    touched_at: Instant,
}

impl TrackedProgress {
    fn is_expired(&self, now: Instant, retention: Duration, stale_after: Duration) -> bool {
        let idle = now.saturating_duration_since(self.touched_at);
        if self.record.status.is_terminal() {
            idle >= retention
        } else {
            idle >= stale_after
        }
    }
}

/// Shared handle to the progress registry. Clones share state.
#[derive(Clone)]
pub struct SyncProgressTracker {
    entries: Arc<DashMap<String, TrackedProgress>>,
    retention: Duration,
    stale_after: Duration,
}

impl SyncProgressTracker {
    pub fn new(retention: Duration, stale_after: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            retention,
            stale_after,
        }
    }

    /// Begin tracking `session_id` as a running job.
    ///
    /// Fails with `Conflict` while a live record is still running under the
    /// same id. Finished or expired records are replaced. The check and the
    /// insert happen under one shard lock.
    pub fn start(&self, session_id: &str, total_items: u64) -> Result<SyncProgressRecord, AppError> {
        let mut record = SyncProgressRecord::new(session_id);
        record.status = SyncStatus::Running;
        record.total_items = total_items;

        let now = Instant::now();
        let tracked = TrackedProgress {
            record: record.clone(),
            touched_at: now,
        };
        match self.entries.entry(session_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                if !existing.record.status.is_terminal()
                    && !existing.is_expired(now, self.retention, self.stale_after)
                {
                    return Err(AppError::Conflict(format!(
                        "Sync session {} is already running",
                        session_id
                    )));
                }
                occupied.insert(tracked);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(tracked);
            }
        }

        tracing::debug!(session_id, total_items, "Sync progress started");
        Ok(record)
    }

    /// Merge `update` into the session. Returns `None` for unknown sessions.
    ///
    /// Terminal records are returned unchanged.
    pub fn update(&self, session_id: &str, update: &ProgressUpdate) -> Option<SyncProgressRecord> {
        self.modify(session_id, |record| record.apply(update))
    }

    /// Mark the session completed.
    pub fn complete(&self, session_id: &str, message: &str) -> Option<SyncProgressRecord> {
        self.finish(session_id, SyncStatus::Completed, message)
    }

    /// Mark the session failed.
    pub fn fail(&self, session_id: &str, message: &str) -> Option<SyncProgressRecord> {
        self.finish(session_id, SyncStatus::Failed, message)
    }

    /// Current snapshot, or `None` if never started or already evicted.
    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgressRecord> {
        let now = Instant::now();
        let (retention, stale_after) = (self.retention, self.stale_after);
        self.entries
            .remove_if(session_id, |_, tracked| {
                tracked.is_expired(now, retention, stale_after)
            });
        self.entries
            .get(session_id)
            .map(|tracked| tracked.record.clone())
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    /// [`Self::evict_expired`] against an explicit clock.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let (retention, stale_after) = (self.retention, self.stale_after);
        self.entries
            .retain(|_, tracked| !tracked.is_expired(now, retention, stale_after));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run [`Self::evict_expired`] every `interval` until the runtime stops.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = tracker.evict_expired();
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted expired sync progress records");
                }
            }
        })
    }

    fn finish(
        &self,
        session_id: &str,
        status: SyncStatus,
        message: &str,
    ) -> Option<SyncProgressRecord> {
        let mut tracked = self.entries.get_mut(session_id)?;
        // A run that completed by reaching its total may still get its
        // closing message; nothing else changes a terminal record.
        let allowed = match tracked.record.status {
            SyncStatus::Failed => false,
            SyncStatus::Completed => status == SyncStatus::Completed,
            SyncStatus::Idle | SyncStatus::Running => true,
        };
        if allowed {
            let record = &mut tracked.record;
            if status == SyncStatus::Completed && record.total_items == 0 {
                record.percentage = 100;
            }
            record.status = status;
            record.message = Some(message.to_string());
            tracked.touched_at = Instant::now();
        }
        Some(tracked.record.clone())
    }

    /// Atomic read-modify-write under the shard lock.
    fn modify(
        &self,
        session_id: &str,
        change: impl FnOnce(&mut SyncProgressRecord),
    ) -> Option<SyncProgressRecord> {
        let mut tracked = self.entries.get_mut(session_id)?;
        if !tracked.record.status.is_terminal() {
            change(&mut tracked.record);
            tracked.touched_at = Instant::now();
        }
        Some(tracked.record.clone())
    }
}
