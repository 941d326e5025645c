use crate::config::Config;
use crate::crawler::{Coordinator, CrawlMode, CrawlReport, StopSignal};
use crate::detect::{ChangeDetector, DetectionSummary};
use crate::scheduler::RunGuard;
use crate::storage::SharedStorage;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Entry points for crawls and detection passes
///
/// Calling a trigger while the same job is running is a logged no-op returning
/// `None`. Crawls and detection passes may overlap each other.
pub struct Trigger {
    coordinator: Coordinator,
    detector: ChangeDetector,
    crawl_guard: RunGuard,
}

impl Trigger {
    pub fn new(coordinator: Coordinator, detector: ChangeDetector) -> Self {
        Self {
            coordinator,
            detector,
            crawl_guard: RunGuard::new(),
        }
    }

    /// Builds a trigger with the default parser over shared storage
    pub fn from_config(config: Arc<Config>, storage: SharedStorage) -> Result<Self> {
        let detector = ChangeDetector::new(Arc::clone(&storage));
        let coordinator = Coordinator::new(config, storage)?;
        Ok(Self::new(coordinator, detector))
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.coordinator.stop_signal()
    }

    pub fn storage(&self) -> &SharedStorage {
        self.coordinator.storage()
    }

    pub fn is_crawl_running(&self) -> bool {
        self.crawl_guard.is_running()
    }

    pub fn is_detection_running(&self) -> bool {
        self.detector.is_running()
    }

    /// Runs a crawl unless one is already running
    pub async fn trigger_crawl(&self, mode: CrawlMode) -> Result<Option<CrawlReport>> {
        let Some(_permit) = self.crawl_guard.try_start() else {
            info!("Crawl already running; trigger ignored");
            return Ok(None);
        };

        let report = self.coordinator.run(mode).await?;
        info!(
            "Triggered crawl ended {} after {:.1}s ({} items processed)",
            report.state.status,
            report.duration.as_secs_f64(),
            report.state.counters.items_processed
        );
        Ok(Some(report))
    }

    /// Runs a detection pass unless one is already running
    pub async fn trigger_change_detection(&self) -> Result<Option<DetectionSummary>> {
        self.detector.detect_changes().await
    }
}
