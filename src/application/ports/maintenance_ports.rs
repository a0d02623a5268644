use async_trait::async_trait;

use crate::application::dtos::maintenance_dto::CleanupResult;

/// Unit of periodic work driven by a cleanup scheduler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CleanupTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Runs one pass; failures are reported in the result
    async fn run(&self) -> CleanupResult;
}
