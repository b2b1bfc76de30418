//! # Rampart
//!
//! Rampart is an IP blocking and abuse mitigation engine for Rust
//! applications. It keeps a persistent, audited record of block episodes
//! per key (an IP address), escalates repeat offenders, tracks failed
//! login attempts with a rolling window, and sweeps expired blocks in the
//! background — while never depending on that sweep for correctness:
//! whether a key is blocked is always decided against the clock at call
//! time.
//!
//! What rampart deliberately does not do: it has no opinion on how you
//! classify abuse (feed it the verdicts of your spam classifier, rate
//! limiter or moderators), and no whitelist — exempting trusted addresses
//! is a policy layer that belongs in front of this engine, before
//! [`Rampart::is_blocked`] is ever consulted.
//!
//! ## Storage Support
//!
//! Rampart currently ships a SQLite backend; any store that can enforce a
//! uniqueness constraint can back the engine by implementing the
//! repository traits in `rampart-core`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rampart::{Rampart, SqliteRepositoryProvider};
//! use rampart::BlockDuration;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
//!
//!     let rampart = Rampart::new(repositories);
//!     rampart.migrate().await.unwrap();
//!
//!     rampart
//!         .block_ip_for("203.0.113.9", BlockDuration::SIX_HOURS, "comment spam", "comment")
//!         .await
//!         .unwrap();
//!     assert!(rampart.is_blocked("203.0.113.9").await.unwrap());
//! }
//! ```

use std::sync::Arc;

use rampart_core::repositories::BlockRepositoryAdapter;

/// Re-export core types from rampart_core
///
/// These types are commonly used when working with the Rampart API. The
/// services are exported too for embedders that wire their own storage.
pub use rampart_core::{
    AttemptTracker, BlockDetails, BlockDuration, BlockPolicy, BlockRecord, BlockRepository,
    BlockStatistics, BlockStatus, BlockingConfig, BlockingService, Clock, Error, Event, EventBus,
    EventError, EventHandler, FailedLoginOutcome, LoginProtectionConfig, LoginProtectionService,
    ManualClock, NewBlock, ReasonCount, RepositoryProvider, StorageError, SystemClock,
    ValidationError,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding
/// feature is enabled.
#[cfg(feature = "sqlite")]
pub use rampart_storage_sqlite::{
    SqliteBlockRepository, SqliteMigrationManager, SqliteRepositoryProvider,
};

/// Top-level configuration for a [`Rampart`] instance.
#[derive(Debug, Clone, Default)]
pub struct RampartConfig {
    pub blocking: BlockingConfig,
    pub login: LoginProtectionConfig,
}

/// The main entry point: blocking engine plus login protection behind one
/// API.
///
/// `Rampart` is generic over a [`RepositoryProvider`], so the same code
/// runs against any storage backend. It is cheap to share behind an
/// `Arc` across request handlers.
pub struct Rampart<R: RepositoryProvider> {
    repositories: Arc<R>,
    blocking: Arc<BlockingService<BlockRepositoryAdapter<R>>>,
    login: LoginProtectionService<BlockRepositoryAdapter<R>>,
    events: EventBus,
}

impl<R: RepositoryProvider> Rampart<R> {
    /// Create a new Rampart instance with default configuration.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::with_config(repositories, RampartConfig::default())
    }

    pub fn with_config(repositories: Arc<R>, config: RampartConfig) -> Self {
        let events = EventBus::new();
        let repository = Arc::new(BlockRepositoryAdapter::new(Arc::clone(&repositories)));
        let blocking = Arc::new(BlockingService::new(
            repository,
            config.blocking,
            events.clone(),
        ));
        let login = LoginProtectionService::new(Arc::clone(&blocking), config.login);

        Self {
            repositories,
            blocking,
            login,
            events,
        }
    }

    /// Run storage migrations. Call once at startup.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Register an audit sink for engine events. Handler failures are
    /// logged and never affect blocking decisions.
    pub async fn register_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.events.register(handler).await;
    }

    // ------------------------------------------------------------------
    // Blocking
    // ------------------------------------------------------------------

    /// Whether `ip` is currently blocked. Check this on inbound request
    /// paths before doing any work for the caller.
    pub async fn is_blocked(&self, ip: &str) -> Result<bool, Error> {
        self.blocking.is_blocked(ip).await
    }

    /// Block `ip` with the configured default duration.
    pub async fn block_ip(&self, ip: &str, reason: &str) -> Result<i64, Error> {
        self.blocking.block_with_default(ip, reason, "system").await
    }

    /// Block `ip` for an explicit duration. Re-blocking an already-active
    /// ip escalates it: the duration and reason are overwritten and the
    /// expiry clock restarts.
    pub async fn block_ip_for(
        &self,
        ip: &str,
        duration: BlockDuration,
        reason: &str,
        source: &str,
    ) -> Result<i64, Error> {
        self.blocking.block(ip, duration, reason, source).await
    }

    /// Remove the active block for `ip`, if any. Idempotent.
    pub async fn unblock_ip(&self, ip: &str, reason: &str) -> Result<bool, Error> {
        self.blocking.unblock(ip, reason).await
    }

    /// Remove every active block. Returns the number removed.
    pub async fn unblock_all(&self, reason: &str) -> Result<u64, Error> {
        self.blocking.unblock_all(reason).await
    }

    /// Details of the block in effect for `ip`, for building a denial
    /// message.
    pub async fn block_details(&self, ip: &str) -> Result<Option<BlockDetails>, Error> {
        self.blocking.block_details(ip).await
    }

    /// Transition time-expired active blocks to expired status.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        self.blocking.sweep_expired().await
    }

    /// Spawn the background sweep task on the configured interval.
    pub fn start_sweep_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.blocking.start_sweep_task(shutdown)
    }

    pub async fn list_blocks(
        &self,
        status: Option<BlockStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<BlockRecord>, Error> {
        self.blocking.list_blocks(status, limit, offset).await
    }

    /// All block episodes recorded for `ip`, newest first.
    pub async fn block_history(&self, ip: &str, limit: u32) -> Result<Vec<BlockRecord>, Error> {
        self.blocking.history(ip, limit).await
    }

    /// Whether `ip` has been blocked more than once.
    pub async fn is_repeat_offender(&self, ip: &str) -> Result<bool, Error> {
        self.blocking.is_repeat_offender(ip).await
    }

    pub async fn statistics(&self) -> Result<BlockStatistics, Error> {
        self.blocking.statistics().await
    }

    // ------------------------------------------------------------------
    // Login protection
    // ------------------------------------------------------------------

    /// Record a failed login from `ip`. Once the configured threshold is
    /// reached the ip is blocked with an escalating duration and its
    /// counter is cleared.
    pub async fn record_failed_login(&self, ip: &str) -> Result<FailedLoginOutcome, Error> {
        self.login.record_failed_attempt(ip).await
    }

    /// Record a successful login from `ip`, clearing its failed-attempt
    /// counter.
    pub async fn record_successful_login(&self, ip: &str) -> Result<(), Error> {
        self.login.record_successful_login(ip).await
    }

    /// Failed login attempts recorded for `ip` in the current window.
    pub fn failed_login_attempts(&self, ip: &str) -> u32 {
        self.login.failed_attempts(ip)
    }
}
