use async_trait::async_trait;

use crate::domain::entities::blocked_ip::IpWhitelistEntry;
use crate::domain::repositories::RepositoryResult;

#[async_trait]
pub trait IpWhitelistRepository: Send + Sync + 'static {
    async fn upsert_entry(&self, entry: &IpWhitelistEntry) -> RepositoryResult<()>;

    async fn find_entry(&self, ip_address: &str) -> RepositoryResult<Option<IpWhitelistEntry>>;

    async fn remove_entry(&self, ip_address: &str) -> RepositoryResult<bool>;

    async fn list_entries(&self) -> RepositoryResult<Vec<IpWhitelistEntry>>;
}
