//! Repository trait for block record storage.
//!
//! This module defines the storage interface the blocking engine runs
//! against. Implementations own the uniqueness and status invariants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    Error,
    block::{BlockDuration, BlockRecord, BlockStatus, NewBlock},
};

/// Aggregated count of active blocks sharing a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

/// Storage for block records.
///
/// Implementations must guarantee that at most one record per key has
/// status `active` at any time, and must enforce that at the storage layer
/// (a uniqueness constraint), not by trusting callers to check first. Two
/// concurrent `insert` calls for the same key must resolve with one
/// succeeding and the other failing with
/// [`StorageError::DuplicateActiveKey`].
///
/// Records are never deleted; status transitions preserve the audit trail.
///
/// Methods that compare against "now" take the timestamp as a parameter:
/// the engine owns the clock, which keeps expiry decisions testable and
/// independent of sweep cadence.
///
/// [`StorageError::DuplicateActiveKey`]: crate::error::StorageError::DuplicateActiveKey
#[async_trait]
pub trait BlockRepository: Send + Sync + 'static {
    /// Return the unique record with status `active` for `key`, if any.
    ///
    /// No time filter is applied: a time-expired record that the sweeper
    /// has not re-labelled yet is still returned, and the engine decides
    /// what it means.
    async fn find_active(&self, key: &str) -> Result<Option<BlockRecord>, Error>;

    /// Insert a fresh block episode with status `active`.
    ///
    /// Fails with `DuplicateActiveKey` if an active record for the key
    /// already exists.
    async fn insert(&self, block: &NewBlock) -> Result<BlockRecord, Error>;

    /// Escalate the active record `id`: overwrite duration, expiry and
    /// reason, increment `attempts_count`, refresh `blocked_at` and
    /// `updated_at`.
    ///
    /// Fails with `NotFound` if `id` does not reference a record that is
    /// still `active`.
    async fn update_active(
        &self,
        id: i64,
        duration: BlockDuration,
        expires_at: Option<DateTime<Utc>>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockRecord, Error>;

    /// Transition every active record with `expires_at <= now` to
    /// `expired`. Permanent records (no expiry) are never touched.
    /// Idempotent; returns the number of records changed.
    async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    /// Transition the active record for `key` to `manually_removed`.
    /// Returns false if the key had no active record.
    async fn mark_removed(&self, key: &str, now: DateTime<Utc>) -> Result<bool, Error>;

    /// Transition all active records to `manually_removed`. Returns the
    /// number of records changed.
    async fn remove_all_active(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    /// List records ordered by `blocked_at` descending, optionally filtered
    /// by status, with pagination.
    async fn list(
        &self,
        status: Option<BlockStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<BlockRecord>, Error>;

    /// All episodes for `key`, newest first.
    async fn history(&self, key: &str, limit: u32) -> Result<Vec<BlockRecord>, Error>;

    /// Total number of episodes ever recorded for `key`, any status.
    async fn episode_count(&self, key: &str) -> Result<u64, Error>;

    async fn count_by_status(&self, status: BlockStatus) -> Result<u64, Error>;

    /// Number of records (any status) with `blocked_at >= since`.
    async fn count_blocked_since(&self, since: DateTime<Utc>) -> Result<u64, Error>;

    /// Top reasons among active records, by count descending. Records with
    /// an empty reason are skipped.
    async fn count_by_reason(&self, limit: u32) -> Result<Vec<ReasonCount>, Error>;

    /// Most recently blocked active records.
    async fn recent_blocks(&self, limit: u32) -> Result<Vec<BlockRecord>, Error>;
}
