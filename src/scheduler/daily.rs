use crate::config::Config;
use crate::crawler::CrawlMode;
use crate::output::write_change_reports;
use crate::scheduler::Trigger;
use crate::{ConfigError, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Once-a-day job: crawl (optionally), detect, then report changes
#[derive(Debug, Clone)]
pub struct DailySchedule {
    run_time: NaiveTime,
    crawl_before_detect: bool,
    reports_dir: PathBuf,
}

impl DailySchedule {
    pub fn new(run_time: NaiveTime, crawl_before_detect: bool, reports_dir: PathBuf) -> Self {
        Self {
            run_time,
            crawl_before_detect,
            reports_dir,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let run_time = config.scheduler.run_time().ok_or_else(|| {
            ConfigError::Validation(format!(
                "run-time must be HH:MM, got '{}'",
                config.scheduler.run_time
            ))
        })?;
        Ok(Self::new(
            run_time,
            config.scheduler.crawl_before_detect,
            config.output.reports_dir.clone(),
        ))
    }

    /// First scheduled instant strictly after `now`
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = Utc.from_utc_datetime(&now.date_naive().and_time(self.run_time));
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }

    /// Sleeps until each scheduled time and runs the job, forever
    pub async fn run(&self, trigger: &Trigger) {
        loop {
            let now = Utc::now();
            let next = self.next_run_after(now);
            info!("Next scheduled run at {}", next.format("%Y-%m-%d %H:%M UTC"));

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            self.run_once(trigger).await;
        }
    }

    /// One scheduled job; failures are logged, never propagated
    pub async fn run_once(&self, trigger: &Trigger) {
        info!("Scheduled job starting");

        if self.crawl_before_detect {
            match trigger.trigger_crawl(CrawlMode::Resume).await {
                Ok(Some(report)) if report.was_stopped() => {
                    info!("Scheduled crawl stopped; skipping detection");
                    return;
                }
                Ok(_) => {}
                Err(e) => error!("Scheduled crawl failed: {}", e),
            }
        }

        match trigger.trigger_change_detection().await {
            Ok(Some(summary)) if summary.changes_found > 0 => {
                match write_change_reports(trigger.storage(), &self.reports_dir, Some(&summary)) {
                    Ok(paths) => info!(
                        "Change report written to {} and {}",
                        paths.json.display(),
                        paths.markdown.display()
                    ),
                    Err(e) => error!("Failed to write change report: {}", e),
                }
            }
            Ok(Some(_)) => info!("No changes detected"),
            Ok(None) => {}
            Err(e) => error!("Scheduled change detection failed: {}", e),
        }
    }
}
