use chrono::NaiveTime;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Shelfwatch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Crawler and fetcher behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Root page of the catalog; categories are discovered from it
    pub target_url: String,

    /// Maximum number of concurrent requests
    pub concurrency: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Base delay of the exponential backoff (milliseconds)
    pub retry_delay_ms: u64,

    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_url: "https://books.toscrape.com/".to_string(),
            concurrency: 10,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2000,
            user_agent: format!("shelfwatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Directory for change reports
    pub reports_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./shelfwatch.db"),
            reports_dir: PathBuf::from("./reports"),
        }
    }
}

/// Daily schedule configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Time of day to run, "HH:MM" in UTC
    pub run_time: String,

    /// Crawl before each scheduled detection pass
    pub crawl_before_detect: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_time: "02:00".to_string(),
            crawl_before_detect: true,
        }
    }
}

impl SchedulerConfig {
    /// Parses `run_time`; `None` if it is not a valid "HH:MM"
    pub fn run_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.run_time.trim(), "%H:%M").ok()
    }
}
