//! Login failure protection.
//!
//! Tracks failed login attempts per key and auto-blocks once the configured
//! threshold is reached, with the block duration escalating by attempt
//! count. The threshold check lives here, not in the blocking engine: the
//! engine blocks whatever it is told to block.

use std::sync::Arc;

use crate::{
    Error,
    attempts::AttemptTracker,
    clock::{Clock, SystemClock},
    config::LoginProtectionConfig,
    events::{Event, EventBus},
    repositories::BlockRepository,
    services::BlockingService,
};

/// Outcome of recording a failed login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedLoginOutcome {
    /// Failed attempts in the current window, this one included.
    pub attempts: u32,
    /// True when this attempt triggered a block.
    pub blocked: bool,
}

/// Service tracking login failures and escalating them into blocks.
pub struct LoginProtectionService<R: BlockRepository> {
    blocking: Arc<BlockingService<R>>,
    attempts: AttemptTracker,
    config: LoginProtectionConfig,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl<R: BlockRepository> LoginProtectionService<R> {
    /// Create a new login protection service sharing the blocking engine's
    /// event bus.
    pub fn new(blocking: Arc<BlockingService<R>>, config: LoginProtectionConfig) -> Self {
        Self::with_clock(blocking, config, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock for the attempt tracker and event
    /// timestamps.
    pub fn with_clock(
        blocking: Arc<BlockingService<R>>,
        config: LoginProtectionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = blocking.events().clone();
        Self {
            attempts: AttemptTracker::with_clock(config.attempt_window, clock.clone()),
            blocking,
            config,
            events,
            clock,
        }
    }

    pub fn config(&self) -> &LoginProtectionConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record a failed login for `key`.
    ///
    /// Increments the rolling counter and, once `max_attempts` is reached,
    /// blocks the key for the escalation policy's duration and clears the
    /// counter (the block supersedes tracking). When protection is
    /// disabled this is a no-op.
    pub async fn record_failed_attempt(&self, key: &str) -> Result<FailedLoginOutcome, Error> {
        if !self.config.enabled {
            return Ok(FailedLoginOutcome {
                attempts: 0,
                blocked: false,
            });
        }

        let attempts = self.attempts.increment(key);
        tracing::info!(key, attempts, "Failed login attempt");
        self.emit(Event::LoginFailed {
            key: key.to_string(),
            attempts,
            timestamp: self.clock.now(),
        })
        .await;

        if attempts >= self.config.max_attempts {
            let duration = self.blocking.policy().duration_for_attempts(attempts);
            let reason = format!("Blocked after {attempts} failed login attempts");
            self.blocking.block(key, duration, &reason, "login").await?;
            self.attempts.clear(key);
            return Ok(FailedLoginOutcome {
                attempts,
                blocked: true,
            });
        }

        Ok(FailedLoginOutcome {
            attempts,
            blocked: false,
        })
    }

    /// Record a successful login for `key`, clearing its attempt counter.
    pub async fn record_successful_login(&self, key: &str) -> Result<(), Error> {
        self.attempts.clear(key);
        self.emit(Event::LoginSucceeded {
            key: key.to_string(),
            timestamp: self.clock.now(),
        })
        .await;
        Ok(())
    }

    /// Current failed-attempt count for `key` in the rolling window.
    pub fn failed_attempts(&self, key: &str) -> u32 {
        self.attempts.get(key)
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.events.emit(&event).await {
            tracing::warn!(error = %e, "Event handler failed; login handling unaffected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDuration, BlockRecord, BlockStatus, NewBlock};
    use crate::clock::ManualClock;
    use crate::config::BlockingConfig;
    use crate::error::StorageError;
    use crate::repositories::ReasonCount;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct MockBlockRepository {
        records: Mutex<Vec<BlockRecord>>,
        next_id: AtomicI64,
    }

    impl MockBlockRepository {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                next_id: AtomicI64::new(1),
            }
        }
    }

    #[async_trait]
    impl BlockRepository for MockBlockRepository {
        async fn find_active(&self, key: &str) -> Result<Option<BlockRecord>, Error> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.key == key && r.status == BlockStatus::Active)
                .cloned())
        }

        async fn insert(&self, block: &NewBlock) -> Result<BlockRecord, Error> {
            let mut records = self.records.lock().unwrap();
            if records
                .iter()
                .any(|r| r.key == block.key && r.status == BlockStatus::Active)
            {
                return Err(StorageError::DuplicateActiveKey(block.key.clone()).into());
            }
            let record = BlockRecord {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                key: block.key.clone(),
                status: BlockStatus::Active,
                blocked_at: block.blocked_at,
                duration: block.duration,
                expires_at: block.expires_at,
                reason: block.reason.clone(),
                source: block.source.clone(),
                attempts_count: 1,
                created_at: block.blocked_at,
                updated_at: block.blocked_at,
            };
            records.push(record.clone());
            Ok(record)
        }

        async fn update_active(
            &self,
            id: i64,
            duration: BlockDuration,
            expires_at: Option<DateTime<Utc>>,
            reason: &str,
            now: DateTime<Utc>,
        ) -> Result<BlockRecord, Error> {
            let mut records = self.records.lock().unwrap();
            match records
                .iter_mut()
                .find(|r| r.id == id && r.status == BlockStatus::Active)
            {
                Some(record) => {
                    record.duration = duration;
                    record.expires_at = expires_at;
                    record.reason = reason.to_string();
                    record.attempts_count += 1;
                    record.blocked_at = now;
                    record.updated_at = now;
                    Ok(record.clone())
                }
                None => Err(StorageError::NotFound.into()),
            }
        }

        async fn mark_expired(&self, _now: DateTime<Utc>) -> Result<u64, Error> {
            Ok(0)
        }

        async fn mark_removed(&self, _key: &str, _now: DateTime<Utc>) -> Result<bool, Error> {
            Ok(false)
        }

        async fn remove_all_active(&self, _now: DateTime<Utc>) -> Result<u64, Error> {
            Ok(0)
        }

        async fn list(
            &self,
            _status: Option<BlockStatus>,
            _limit: u32,
            _offset: u32,
        ) -> Result<Vec<BlockRecord>, Error> {
            Ok(Vec::new())
        }

        async fn history(&self, _key: &str, _limit: u32) -> Result<Vec<BlockRecord>, Error> {
            Ok(Vec::new())
        }

        async fn episode_count(&self, _key: &str) -> Result<u64, Error> {
            Ok(0)
        }

        async fn count_by_status(&self, _status: BlockStatus) -> Result<u64, Error> {
            Ok(0)
        }

        async fn count_blocked_since(&self, _since: DateTime<Utc>) -> Result<u64, Error> {
            Ok(0)
        }

        async fn count_by_reason(&self, _limit: u32) -> Result<Vec<ReasonCount>, Error> {
            Ok(Vec::new())
        }

        async fn recent_blocks(&self, _limit: u32) -> Result<Vec<BlockRecord>, Error> {
            Ok(Vec::new())
        }
    }

    fn setup(
        config: LoginProtectionConfig,
    ) -> (
        Arc<MockBlockRepository>,
        LoginProtectionService<MockBlockRepository>,
        Arc<ManualClock>,
    ) {
        let repo = Arc::new(MockBlockRepository::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let blocking = Arc::new(BlockingService::with_clock(
            repo.clone(),
            BlockingConfig::default(),
            EventBus::new(),
            clock.clone(),
        ));
        let service = LoginProtectionService::with_clock(blocking, config, clock.clone());
        (repo, service, clock)
    }

    #[tokio::test]
    async fn test_attempts_below_threshold_do_not_block() {
        let (repo, service, _clock) = setup(LoginProtectionConfig::default());

        for expected in 1..=4 {
            let outcome = service.record_failed_attempt("10.0.0.5").await.unwrap();
            assert_eq!(outcome.attempts, expected);
            assert!(!outcome.blocked);
        }
        assert_eq!(service.failed_attempts("10.0.0.5"), 4);
        assert!(repo.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_blocks_with_escalated_duration_and_clears_counter() {
        let (repo, service, _clock) = setup(LoginProtectionConfig::default());

        for _ in 0..4 {
            service.record_failed_attempt("10.0.0.5").await.unwrap();
        }
        let outcome = service.record_failed_attempt("10.0.0.5").await.unwrap();
        assert!(outcome.blocked);
        assert_eq!(outcome.attempts, 5);

        let records = repo.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        // duration_for_attempts(5) maps to 24 hours.
        assert_eq!(records[0].duration, BlockDuration::ONE_DAY);
        assert_eq!(records[0].source, "login");
        assert_eq!(records[0].reason, "Blocked after 5 failed login attempts");
        drop(records);

        // Block supersedes tracking.
        assert_eq!(service.failed_attempts("10.0.0.5"), 0);
    }

    #[tokio::test]
    async fn test_successful_login_clears_counter() {
        let (_repo, service, _clock) = setup(LoginProtectionConfig::default());

        service.record_failed_attempt("10.0.0.5").await.unwrap();
        service.record_failed_attempt("10.0.0.5").await.unwrap();
        service.record_successful_login("10.0.0.5").await.unwrap();
        assert_eq!(service.failed_attempts("10.0.0.5"), 0);

        // The streak starts over after a success.
        let outcome = service.record_failed_attempt("10.0.0.5").await.unwrap();
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_disabled_protection_is_a_noop() {
        let (repo, service, _clock) = setup(LoginProtectionConfig::disabled());

        for _ in 0..10 {
            let outcome = service.record_failed_attempt("10.0.0.5").await.unwrap();
            assert_eq!(outcome.attempts, 0);
            assert!(!outcome.blocked);
        }
        assert_eq!(service.failed_attempts("10.0.0.5"), 0);
        assert!(repo.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_window_lapse_resets_the_streak() {
        let config = LoginProtectionConfig {
            enabled: true,
            max_attempts: 3,
            attempt_window: Duration::minutes(10),
        };
        let (repo, service, clock) = setup(config);

        service.record_failed_attempt("10.0.0.5").await.unwrap();
        service.record_failed_attempt("10.0.0.5").await.unwrap();

        clock.advance(Duration::minutes(11));
        let outcome = service.record_failed_attempt("10.0.0.5").await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.blocked);
        assert!(repo.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ten_attempts_escalate_to_seven_days() {
        let config = LoginProtectionConfig {
            enabled: true,
            max_attempts: 10,
            attempt_window: Duration::hours(1),
        };
        let (repo, service, _clock) = setup(config);

        for _ in 0..9 {
            service.record_failed_attempt("10.0.0.5").await.unwrap();
        }
        let outcome = service.record_failed_attempt("10.0.0.5").await.unwrap();
        assert!(outcome.blocked);

        let records = repo.records.lock().unwrap();
        assert_eq!(records[0].duration, BlockDuration::SEVEN_DAYS);
    }
}
