use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::blocked_ip::BlockedIp;
use crate::domain::repositories::RepositoryResult;

#[async_trait]
pub trait BlockedIpRepository: Send + Sync + 'static {
    /// Inserts or replaces the block for the address
    async fn upsert_block(&self, block: &BlockedIp) -> RepositoryResult<()>;

    /// Block for the address that has not lapsed at `now`
    async fn find_active_block(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<BlockedIp>>;

    async fn remove_block(&self, ip_address: &str) -> RepositoryResult<bool>;

    async fn list_blocks(&self) -> RepositoryResult<Vec<BlockedIp>>;

    /// Removes timed blocks whose expiry is at or before `now`
    async fn delete_expired_blocks(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}
