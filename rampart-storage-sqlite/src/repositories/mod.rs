//! Repository implementations for SQLite storage

pub mod block;

pub use block::SqliteBlockRepository;

use async_trait::async_trait;
use rampart_core::{
    Error,
    error::StorageError,
    repositories::{BlockRepositoryProvider, RepositoryProvider},
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::migrations::{SqliteMigrationManager, migrations};
use rampart_migration::MigrationManager;

/// Repository provider implementation for SQLite
///
/// Bundles the block repository with schema migration and health-check
/// lifecycle methods.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    blocks: Arc<SqliteBlockRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let blocks = Arc::new(SqliteBlockRepository::new(pool.clone()));
        Self { pool, blocks }
    }

    /// Connect to a SQLite database and build a provider around the pool.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl BlockRepositoryProvider for SqliteRepositoryProvider {
    type BlockRepo = SqliteBlockRepository;

    fn blocks(&self) -> &Self::BlockRepo {
        &self.blocks
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager
            .initialize()
            .await
            .map_err(|e| Error::Storage(StorageError::Migration(e.to_string())))?;
        manager
            .up(&migrations())
            .await
            .map_err(|e| Error::Storage(StorageError::Migration(e.to_string())))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?;
        Ok(())
    }
}
