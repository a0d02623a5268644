use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::maintenance_ports::CleanupTask;

/// Runs a cleanup task immediately and then once per interval until cancelled.
///
/// A failing or panicking pass is logged and the loop keeps going.
pub struct CleanupScheduler {
    task: Arc<dyn CleanupTask>,
    interval: Duration,
    enabled: bool,
}

impl CleanupScheduler {
    pub fn new(task: Arc<dyn CleanupTask>, interval: Duration, enabled: bool) -> Self {
        Self {
            task,
            // Zero would spin the loop
            interval: interval.max(Duration::from_secs(1)),
            enabled,
        }
    }

    /// Spawns the loop; returns `None` when the job is disabled
    pub fn start(self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.enabled {
            info!("Cleanup job '{}' is disabled", self.task.name());
            return None;
        }

        info!(
            "Starting cleanup job '{}' every {}s",
            self.task.name(),
            self.interval.as_secs()
        );

        Some(tokio::spawn(self.run(shutdown)))
    }

    async fn run(self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Cleanup job '{}' stopped", self.task.name());
    }

    async fn tick(&self) {
        let name = self.task.name();
        debug!("Running cleanup job '{}'", name);

        match AssertUnwindSafe(self.task.run()).catch_unwind().await {
            Ok(result) if result.successful => {
                info!("Cleanup job '{}': {} removed ({})", name, result.count_removed, result.message);
            }
            Ok(result) => {
                warn!("Cleanup job '{}' failed: {}", name, result.message);
            }
            Err(_) => {
                error!("Cleanup job '{}' panicked; will retry next interval", name);
            }
        }
    }
}
