//! Core functionality for the rampart abuse mitigation ecosystem.
//!
//! This crate contains the blocking engine: block records and durations,
//! the escalation policy, the failed-attempt tracker, the repository
//! traits that storage backends implement, and the services that tie them
//! together. It has no storage backend of its own; see the
//! `rampart-storage-*` crates.
//!
//! The crate is consumed through the `rampart` facade by application code
//! and used directly by storage backends and embedders with custom
//! storage.

pub mod attempts;
pub mod block;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod policy;
pub mod repositories;
pub mod services;
pub mod validation;

pub use attempts::AttemptTracker;
pub use block::{BlockDetails, BlockDuration, BlockRecord, BlockStatus, NewBlock};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BlockingConfig, LoginProtectionConfig};
pub use error::{Error, EventError, StorageError, ValidationError};
pub use events::{Event, EventBus, EventHandler};
pub use policy::BlockPolicy;
pub use repositories::{
    BlockRepository, BlockRepositoryAdapter, BlockRepositoryProvider, ReasonCount,
    RepositoryProvider,
};
pub use services::{BlockStatistics, BlockingService, FailedLoginOutcome, LoginProtectionService};
