use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, instrument, warn};

use crate::application::dtos::maintenance_dto::CleanupResult;
use crate::common::clock::Clock;
use crate::common::errors::Result;
use crate::domain::entities::blocked_ip::{address_key, BlockedIp, IpWhitelistEntry};
use crate::domain::entities::ip_security_event::{IpSecurityEvent, SecurityOperation, SecurityOutcome};
use crate::domain::repositories::blocked_ip_repository::BlockedIpRepository;
use crate::domain::repositories::ip_security_event_repository::IpSecurityEventRepository;
use crate::domain::repositories::ip_whitelist_repository::IpWhitelistRepository;

/// Security event log plus the IP block list and its whitelist override
pub struct IpSecurityService {
    event_repository: Arc<dyn IpSecurityEventRepository>,
    block_repository: Arc<dyn BlockedIpRepository>,
    whitelist_repository: Arc<dyn IpWhitelistRepository>,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl IpSecurityService {
    pub fn new(
        event_repository: Arc<dyn IpSecurityEventRepository>,
        block_repository: Arc<dyn BlockedIpRepository>,
        whitelist_repository: Arc<dyn IpWhitelistRepository>,
        retention: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            event_repository,
            block_repository,
            whitelist_repository,
            retention,
            clock,
        }
    }

    #[instrument(skip(self, detail))]
    pub async fn record_event(
        &self,
        ip: IpAddr,
        operation: SecurityOperation,
        outcome: SecurityOutcome,
        user_id: Option<String>,
        detail: Option<String>,
    ) -> Result<()> {
        let event = IpSecurityEvent::new(ip, operation, outcome, user_id, detail, self.clock.now());
        self.event_repository.record_event(&event).await?;
        Ok(())
    }

    /// Failure events from `ip` at or after `since`
    pub async fn get_failed_attempts_count(&self, ip: IpAddr, since: DateTime<Utc>) -> Result<i64> {
        let count = self
            .event_repository
            .count_events_since(&address_key(ip), SecurityOutcome::Failure, since)
            .await?;
        Ok(count)
    }

    /// Whitelisted addresses are never blocked. Store errors propagate.
    #[instrument(skip(self))]
    pub async fn is_blocked(&self, ip: IpAddr) -> Result<bool> {
        let address = address_key(ip);

        if self.whitelist_repository.find_entry(&address).await?.is_some() {
            return Ok(false);
        }

        let block = self
            .block_repository
            .find_active_block(&address, self.clock.now())
            .await?;
        Ok(block.is_some())
    }

    /// `duration = None` blocks permanently
    #[instrument(skip(self))]
    pub async fn block_ip(
        &self,
        ip: IpAddr,
        reason: &str,
        duration: Option<Duration>,
        is_automatic: bool,
    ) -> Result<BlockedIp> {
        let block = BlockedIp::new(ip, reason.to_string(), self.clock.now(), duration, is_automatic);
        self.block_repository.upsert_block(&block).await?;

        match block.expires_at {
            Some(until) => warn!("Blocked {} until {}: {}", ip, until, reason),
            None => warn!("Blocked {} permanently: {}", ip, reason),
        }
        Ok(block)
    }

    #[instrument(skip(self))]
    pub async fn unblock_ip(&self, ip: IpAddr) -> Result<bool> {
        let removed = self.block_repository.remove_block(&address_key(ip)).await?;
        if removed {
            info!("Unblocked {}", ip);
        }
        Ok(removed)
    }

    pub async fn list_blocked_ips(&self) -> Result<Vec<BlockedIp>> {
        Ok(self.block_repository.list_blocks().await?)
    }

    #[instrument(skip(self))]
    pub async fn add_to_whitelist(
        &self,
        ip: IpAddr,
        is_admin: bool,
        description: Option<String>,
    ) -> Result<IpWhitelistEntry> {
        let entry = IpWhitelistEntry::new(ip, is_admin, description, self.clock.now());
        self.whitelist_repository.upsert_entry(&entry).await?;
        info!("Whitelisted {} (admin: {})", ip, is_admin);
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn remove_from_whitelist(&self, ip: IpAddr) -> Result<bool> {
        Ok(self.whitelist_repository.remove_entry(&address_key(ip)).await?)
    }

    pub async fn list_whitelist(&self) -> Result<Vec<IpWhitelistEntry>> {
        Ok(self.whitelist_repository.list_entries().await?)
    }

    pub async fn delete_old_events(&self, cutoff: DateTime<Utc>) -> CleanupResult {
        match self.event_repository.delete_events_before(cutoff).await {
            Ok(count) => CleanupResult::success(count, format!("{} security events removed", count)),
            Err(e) => {
                error!("Security event cleanup failed: {}", e);
                CleanupResult::failure(format!("security event cleanup failed: {}", e))
            }
        }
    }

    /// Drops events older than the retention window
    #[instrument(skip(self))]
    pub async fn cleanup_old_events(&self) -> CleanupResult {
        let cutoff = self.clock.now() - self.retention;
        self.delete_old_events(cutoff).await
    }

    #[instrument(skip(self))]
    pub async fn purge_expired_blocks(&self) -> CleanupResult {
        match self.block_repository.delete_expired_blocks(self.clock.now()).await {
            Ok(count) => CleanupResult::success(count, format!("{} expired IP blocks removed", count)),
            Err(e) => {
                error!("Expired IP block cleanup failed: {}", e);
                CleanupResult::failure(format!("IP block cleanup failed: {}", e))
            }
        }
    }
}
