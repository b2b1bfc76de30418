use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rampart::{
    BlockDuration, BlockingConfig, BlockingService, Event, EventBus, EventError, EventHandler,
    LoginProtectionConfig, LoginProtectionService, ManualClock, Rampart, RampartConfig,
    SqliteBlockRepository, SqliteRepositoryProvider,
};
use sqlx::sqlite::SqlitePoolOptions;

async fn setup() -> Rampart<SqliteRepositoryProvider> {
    setup_with_config(RampartConfig::default()).await
}

async fn setup_with_config(config: RampartConfig) -> Rampart<SqliteRepositoryProvider> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create pool");
    let rampart = Rampart::with_config(Arc::new(SqliteRepositoryProvider::new(pool)), config);
    rampart.migrate().await.expect("Failed to run migrations");
    rampart
}

async fn login_stack_with_clock() -> (
    Arc<BlockingService<SqliteBlockRepository>>,
    LoginProtectionService<SqliteBlockRepository>,
    Arc<ManualClock>,
) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create pool");
    let provider = SqliteRepositoryProvider::new(pool);
    rampart::RepositoryProvider::migrate(&provider)
        .await
        .expect("Failed to run migrations");

    let repository = Arc::new(SqliteBlockRepository::new(provider.pool().clone()));
    let start = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let blocking = Arc::new(BlockingService::with_clock(
        repository,
        BlockingConfig::default(),
        EventBus::new(),
        clock.clone(),
    ));
    let login = LoginProtectionService::with_clock(
        blocking.clone(),
        LoginProtectionConfig::default(),
        clock.clone(),
    );
    (blocking, login, clock)
}

#[tokio::test]
async fn test_failed_login_scenario_escalates_into_block() {
    let (blocking, login, clock) = login_stack_with_clock().await;
    let ip = "10.0.0.5";

    // Three failures: tracked, not yet blocked.
    for expected in 1..=3 {
        let outcome = login.record_failed_attempt(ip).await.unwrap();
        assert_eq!(outcome.attempts, expected);
        assert!(!outcome.blocked);
    }
    assert_eq!(login.failed_attempts(ip), 3);
    assert!(!blocking.is_blocked(ip).await.unwrap());

    // Two more: the fifth crosses max_attempts and auto-blocks for the
    // escalation duration of 5 attempts, 24 hours.
    login.record_failed_attempt(ip).await.unwrap();
    let outcome = login.record_failed_attempt(ip).await.unwrap();
    assert!(outcome.blocked);
    assert_eq!(outcome.attempts, 5);

    // The counter was cleared: the block supersedes tracking.
    assert_eq!(login.failed_attempts(ip), 0);
    assert!(blocking.is_blocked(ip).await.unwrap());

    clock.advance(Duration::seconds(1));
    let details = blocking.block_details(ip).await.unwrap().unwrap();
    assert_eq!(details.duration, BlockDuration::ONE_DAY);
    assert_eq!(details.source, "login");
    assert_eq!(details.reason, "Blocked after 5 failed login attempts");
    assert_eq!(details.time_remaining, "23 hours, 59 minutes");
}

#[tokio::test]
async fn test_successful_login_resets_the_streak() {
    let rampart = setup().await;
    let ip = "10.0.0.5";

    for _ in 0..4 {
        rampart.record_failed_login(ip).await.unwrap();
    }
    assert_eq!(rampart.failed_login_attempts(ip), 4);

    rampart.record_successful_login(ip).await.unwrap();
    assert_eq!(rampart.failed_login_attempts(ip), 0);

    // One more failure starts a fresh streak; no block results.
    let outcome = rampart.record_failed_login(ip).await.unwrap();
    assert_eq!(outcome.attempts, 1);
    assert!(!rampart.is_blocked(ip).await.unwrap());
}

#[tokio::test]
async fn test_disabled_login_protection_never_blocks() {
    let rampart = setup_with_config(RampartConfig {
        login: LoginProtectionConfig::disabled(),
        ..RampartConfig::default()
    })
    .await;

    for _ in 0..20 {
        let outcome = rampart.record_failed_login("10.0.0.5").await.unwrap();
        assert!(!outcome.blocked);
    }
    assert!(!rampart.is_blocked("10.0.0.5").await.unwrap());
}

#[tokio::test]
async fn test_lower_threshold_uses_shorter_escalation() {
    let rampart = setup_with_config(RampartConfig {
        login: LoginProtectionConfig {
            enabled: true,
            max_attempts: 3,
            attempt_window: Duration::hours(1),
        },
        ..RampartConfig::default()
    })
    .await;

    rampart.record_failed_login("10.0.0.5").await.unwrap();
    rampart.record_failed_login("10.0.0.5").await.unwrap();
    let outcome = rampart.record_failed_login("10.0.0.5").await.unwrap();
    assert!(outcome.blocked);

    // duration_for_attempts(3) maps to 6 hours.
    let details = rampart.block_details("10.0.0.5").await.unwrap().unwrap();
    assert_eq!(details.duration, BlockDuration::SIX_HOURS);
}

struct RecordingHandler {
    seen: Mutex<Vec<Event>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_login_flow_is_audited() {
    let rampart = setup().await;
    let recorder = Arc::new(RecordingHandler {
        seen: Mutex::new(Vec::new()),
    });
    rampart.register_event_handler(recorder.clone()).await;

    for _ in 0..5 {
        rampart.record_failed_login("10.0.0.5").await.unwrap();
    }

    let seen = recorder.seen.lock().unwrap();
    // Five LoginFailed events, then the block that the fifth triggered.
    assert_eq!(seen.len(), 6);
    assert!(matches!(
        &seen[4],
        Event::LoginFailed { attempts: 5, .. }
    ));
    assert!(matches!(
        &seen[5],
        Event::IpBlocked { escalation: false, source, .. } if source == "login"
    ));
}
