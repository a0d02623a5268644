use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::ip_security_event::{IpSecurityEvent, SecurityOutcome};
use crate::domain::repositories::RepositoryResult;

/// Append-only log of authentication events per address
#[async_trait]
pub trait IpSecurityEventRepository: Send + Sync + 'static {
    async fn record_event(&self, event: &IpSecurityEvent) -> RepositoryResult<()>;

    /// Events for `ip_address` with `outcome` at or after `since`
    async fn count_events_since(
        &self,
        ip_address: &str,
        outcome: SecurityOutcome,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64>;

    async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}
