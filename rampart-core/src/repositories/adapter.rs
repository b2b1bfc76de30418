//! Adapter that wraps a [`RepositoryProvider`] and implements the
//! repository traits by delegation, so services can be generic over a
//! single repository type.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    block::{BlockDuration, BlockRecord, BlockStatus, NewBlock},
    repositories::{BlockRepository, ReasonCount, RepositoryProvider},
};

pub struct BlockRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> BlockRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> BlockRepository for BlockRepositoryAdapter<R> {
    async fn find_active(&self, key: &str) -> Result<Option<BlockRecord>, Error> {
        self.provider.blocks().find_active(key).await
    }

    async fn insert(&self, block: &NewBlock) -> Result<BlockRecord, Error> {
        self.provider.blocks().insert(block).await
    }

    async fn update_active(
        &self,
        id: i64,
        duration: BlockDuration,
        expires_at: Option<DateTime<Utc>>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockRecord, Error> {
        self.provider
            .blocks()
            .update_active(id, duration, expires_at, reason, now)
            .await
    }

    async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.blocks().mark_expired(now).await
    }

    async fn mark_removed(&self, key: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        self.provider.blocks().mark_removed(key, now).await
    }

    async fn remove_all_active(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.blocks().remove_all_active(now).await
    }

    async fn list(
        &self,
        status: Option<BlockStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<BlockRecord>, Error> {
        self.provider.blocks().list(status, limit, offset).await
    }

    async fn history(&self, key: &str, limit: u32) -> Result<Vec<BlockRecord>, Error> {
        self.provider.blocks().history(key, limit).await
    }

    async fn episode_count(&self, key: &str) -> Result<u64, Error> {
        self.provider.blocks().episode_count(key).await
    }

    async fn count_by_status(&self, status: BlockStatus) -> Result<u64, Error> {
        self.provider.blocks().count_by_status(status).await
    }

    async fn count_blocked_since(&self, since: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.blocks().count_blocked_since(since).await
    }

    async fn count_by_reason(&self, limit: u32) -> Result<Vec<ReasonCount>, Error> {
        self.provider.blocks().count_by_reason(limit).await
    }

    async fn recent_blocks(&self, limit: u32) -> Result<Vec<BlockRecord>, Error> {
        self.provider.blocks().recent_blocks(limit).await
    }
}
