//! SQLite storage backend for rampart.
//!
//! Implements [`BlockRepository`](rampart_core::repositories::BlockRepository)
//! over a `sqlx` SQLite pool. The (key, active) uniqueness invariant is
//! enforced by a partial unique index, making the database the
//! serialization point for concurrent block attempts.

pub mod migrations;
pub mod repositories;

pub use migrations::SqliteMigrationManager;
pub use repositories::{SqliteBlockRepository, SqliteRepositoryProvider};
