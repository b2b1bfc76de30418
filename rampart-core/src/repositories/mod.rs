//! Repository traits for the data access layer.
//!
//! Services talk to storage through these traits; storage backends
//! implement them plus the provider trait that bundles lifecycle methods
//! (migrations, health check).

pub mod adapter;
pub mod block;

pub use adapter::BlockRepositoryAdapter;
pub use block::{BlockRepository, ReasonCount};

use async_trait::async_trait;

use crate::Error;

/// Provider trait for block repository access.
pub trait BlockRepositoryProvider: Send + Sync + 'static {
    /// The block repository implementation type
    type BlockRepo: BlockRepository;

    /// Get the block repository
    fn blocks(&self) -> &Self::BlockRepo;
}

/// Provider trait that storage backends implement to expose their
/// repositories plus lifecycle methods.
#[async_trait]
pub trait RepositoryProvider: BlockRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<(), Error>;
}
