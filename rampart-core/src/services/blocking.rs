//! The blocking engine: block, unblock, check, sweep.
//!
//! # Correctness
//!
//! Whether a key is blocked is decided by comparing `expires_at` against
//! the clock at call time, never by trusting the stored status flag. The
//! background sweeper only re-labels time-expired records for reporting;
//! [`BlockingService::is_blocked`] is correct no matter how stale the
//! sweep is.
//!
//! # Concurrency
//!
//! Two concurrent `block` calls for a not-yet-blocked key race on the
//! storage-level uniqueness constraint. The loser's insert fails with
//! `DuplicateActiveKey` and is retried exactly once as an escalation of
//! the record the winner created.

use std::sync::Arc;

use chrono::NaiveTime;
use serde::Serialize;

use crate::{
    Error,
    block::{BlockDetails, BlockDuration, BlockRecord, BlockStatus, NewBlock},
    clock::{Clock, SystemClock},
    config::BlockingConfig,
    error::StorageError,
    events::{Event, EventBus},
    policy::BlockPolicy,
    repositories::{BlockRepository, ReasonCount},
    validation::validate_key,
};

/// Aggregate reporting snapshot for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct BlockStatistics {
    pub active_blocks: u64,
    pub blocks_today: u64,
    pub by_reason: Vec<ReasonCount>,
    pub recent_blocks: Vec<BlockRecord>,
}

/// Service coordinating block records, policy and audit events.
///
/// # Thread Safety
///
/// The service is thread-safe and is shared across request-handling tasks
/// behind an `Arc`. The repository is the serialization point for the
/// (key, active) uniqueness invariant.
pub struct BlockingService<R: BlockRepository> {
    repository: Arc<R>,
    policy: BlockPolicy,
    events: EventBus,
    clock: Arc<dyn Clock>,
    sweep_interval: std::time::Duration,
}

impl<R: BlockRepository> BlockingService<R> {
    pub fn new(repository: Arc<R>, config: BlockingConfig, events: EventBus) -> Self {
        Self::with_clock(repository, config, events, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock. Tests use this with a
    /// [`ManualClock`](crate::clock::ManualClock) to drive expiry.
    pub fn with_clock(
        repository: Arc<R>,
        config: BlockingConfig,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            policy: BlockPolicy::new(config.default_duration),
            events,
            clock,
            sweep_interval: config.sweep_interval,
        }
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Whether `key` is currently blocked.
    ///
    /// True iff an active record exists and it is permanent or its expiry
    /// lies in the future. A record the sweeper has not re-labelled yet
    /// never blocks erroneously.
    pub async fn is_blocked(&self, key: &str) -> Result<bool, Error> {
        let now = self.clock.now();
        Ok(self
            .repository
            .find_active(key)
            .await?
            .is_some_and(|record| record.is_in_effect(now)))
    }

    /// Block `key` for `duration`.
    ///
    /// Creates a fresh episode, or escalates the existing active one:
    /// `attempts_count` is incremented and duration, expiry and reason are
    /// overwritten. Last write wins; repeated calls reset the clock. That
    /// is the contract, not an accident.
    ///
    /// Returns the id of the affected record.
    pub async fn block(
        &self,
        key: &str,
        duration: BlockDuration,
        reason: &str,
        source: &str,
    ) -> Result<i64, Error> {
        validate_key(key)?;
        let now = self.clock.now();
        let expires_at = duration.expires_at(now);

        let (record, escalation) = match self.repository.find_active(key).await? {
            Some(active) => {
                match self
                    .repository
                    .update_active(active.id, duration, expires_at, reason, now)
                    .await
                {
                    Ok(record) => (record, true),
                    // The sweeper or an unblock retired the row between the
                    // lookup and the update; start a fresh episode.
                    Err(Error::Storage(StorageError::NotFound)) => {
                        let block = NewBlock::new(key, duration, reason, source, now);
                        (self.repository.insert(&block).await?, false)
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                let block = NewBlock::new(key, duration, reason, source, now);
                match self.repository.insert(&block).await {
                    Ok(record) => (record, false),
                    // A concurrent block() won the insert; retry once as an
                    // escalation of the record it created.
                    Err(e) if e.is_duplicate_active_key() => {
                        let winner = self
                            .repository
                            .find_active(key)
                            .await?
                            .ok_or(Error::Storage(StorageError::NotFound))?;
                        let record = self
                            .repository
                            .update_active(winner.id, duration, expires_at, reason, now)
                            .await?;
                        (record, true)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        tracing::info!(
            key,
            duration = %duration,
            source,
            escalation,
            "IP blocked"
        );
        self.emit(Event::IpBlocked {
            key: key.to_string(),
            duration,
            reason: reason.to_string(),
            source: source.to_string(),
            escalation,
            timestamp: now,
        })
        .await;

        Ok(record.id)
    }

    /// Block `key` with the policy's default duration.
    pub async fn block_with_default(
        &self,
        key: &str,
        reason: &str,
        source: &str,
    ) -> Result<i64, Error> {
        self.block(key, self.policy.default_duration(), reason, source)
            .await
    }

    /// Remove the active block for `key`, if any.
    ///
    /// Returns false when no active block existed. Idempotent: a second
    /// call is a silent no-op, not an error.
    pub async fn unblock(&self, key: &str, reason: &str) -> Result<bool, Error> {
        let now = self.clock.now();
        let removed = self.repository.mark_removed(key, now).await?;
        if removed {
            tracing::info!(key, reason, "IP unblocked");
            self.emit(Event::IpUnblocked {
                key: key.to_string(),
                reason: reason.to_string(),
                timestamp: now,
            })
            .await;
        }
        Ok(removed)
    }

    /// Remove every active block at once. Returns the number removed.
    pub async fn unblock_all(&self, reason: &str) -> Result<u64, Error> {
        let now = self.clock.now();
        let count = self.repository.remove_all_active(now).await?;
        if count > 0 {
            tracing::warn!(count, reason, "All active IP blocks removed");
            self.emit(Event::AllBlocksRemoved {
                count,
                reason: reason.to_string(),
                timestamp: now,
            })
            .await;
        }
        Ok(count)
    }

    /// Details of the block currently in effect for `key`, for display.
    ///
    /// `None` when the key is not blocked, including the case of an active
    /// record whose expiry has passed but which the sweeper has not
    /// re-labelled yet.
    pub async fn block_details(&self, key: &str) -> Result<Option<BlockDetails>, Error> {
        let now = self.clock.now();
        Ok(self
            .repository
            .find_active(key)
            .await?
            .filter(|record| record.is_in_effect(now))
            .map(|record| BlockDetails::from_record(&record, now)))
    }

    /// Transition time-expired active records to `expired`.
    ///
    /// Intended to run on a timer (see [`start_sweep_task`]); safe to call
    /// concurrently with `block`/`unblock` and at any cadence.
    ///
    /// [`start_sweep_task`]: BlockingService::start_sweep_task
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        let now = self.clock.now();
        let count = self.repository.mark_expired(now).await?;
        if count > 0 {
            tracing::info!(count, "Expired IP blocks swept");
            self.emit(Event::ExpiredBlocksSwept {
                count,
                timestamp: now,
            })
            .await;
        }
        Ok(count)
    }

    /// Spawn the periodic sweep task.
    ///
    /// Runs [`sweep_expired`](BlockingService::sweep_expired) on the
    /// configured interval until `shutdown` changes.
    pub fn start_sweep_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let events = self.events.clone();
        let clock = Arc::clone(&self.clock);
        let interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let now = clock.now();
                        match repository.mark_expired(now).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count, "Expired IP blocks swept");
                                if let Err(e) = events
                                    .emit(&Event::ExpiredBlocksSwept { count, timestamp: now })
                                    .await
                                {
                                    tracing::warn!(error = %e, "Event handler failed for sweep event");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to sweep expired IP blocks");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down expiry sweep task");
                        break;
                    }
                }
            }
        })
    }

    pub async fn list_blocks(
        &self,
        status: Option<BlockStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<BlockRecord>, Error> {
        self.repository.list(status, limit, offset).await
    }

    /// All block episodes recorded for `key`, newest first.
    pub async fn history(&self, key: &str, limit: u32) -> Result<Vec<BlockRecord>, Error> {
        self.repository.history(key, limit).await
    }

    /// Number of block episodes ever recorded for `key`.
    pub async fn offender_count(&self, key: &str) -> Result<u64, Error> {
        self.repository.episode_count(key).await
    }

    /// Whether `key` has been blocked more than once.
    pub async fn is_repeat_offender(&self, key: &str) -> Result<bool, Error> {
        Ok(self.offender_count(key).await? > 1)
    }

    pub async fn statistics(&self) -> Result<BlockStatistics, Error> {
        let now = self.clock.now();
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();

        Ok(BlockStatistics {
            active_blocks: self.repository.count_by_status(BlockStatus::Active).await?,
            blocks_today: self.repository.count_blocked_since(midnight).await?,
            by_reason: self.repository.count_by_reason(10).await?,
            recent_blocks: self.repository.recent_blocks(10).await?,
        })
    }

    /// Emit an audit event. A failing handler is logged and ignored; it
    /// must never fail the decision that produced the event.
    async fn emit(&self, event: Event) {
        if let Err(e) = self.events.emit(&event).await {
            tracing::warn!(error = %e, "Event handler failed; blocking decision unaffected");
        }
    }
}
