//! Shelfwatch main entry point
//!
//! This is the command-line interface for the Shelfwatch catalog harvester.

use anyhow::Context;
use clap::Parser;
use shelfwatch::config::{load_config_with_hash, Config};
use shelfwatch::crawler::CrawlMode;
use shelfwatch::output::{load_statistics, print_statistics, write_change_reports};
use shelfwatch::scheduler::{DailySchedule, Trigger};
use shelfwatch::storage::{self, open_storage, SharedStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Shelfwatch: a resumable catalog harvester with change detection
///
/// Shelfwatch crawls a paginated catalog, stores every item keyed by its
/// canonical URL and records price and availability changes between harvests.
#[derive(Parser, Debug)]
#[command(name = "shelfwatch")]
#[command(version)]
#[command(about = "A resumable catalog harvester with change detection", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, ignoring an interrupted run
    #[arg(long)]
    fresh: bool,

    /// Run a change detection pass without crawling
    #[arg(long, conflicts_with_all = ["fresh", "schedule"])]
    detect_only: bool,

    /// Run the daily schedule until interrupted
    #[arg(long)]
    schedule: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_report", "schedule", "detect_only"])]
    stats: bool,

    /// Write a change report from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "schedule", "detect_only"])]
    export_report: bool,

    /// Validate config and show what would run without touching the network
    #[arg(long, conflicts_with_all = ["stats", "export_report", "schedule", "detect_only"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let storage = open_storage(&config.output.database_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.output.database_path.display()
        )
    })?;

    if cli.stats {
        handle_stats(&config, &storage)?;
    } else if cli.export_report {
        handle_export_report(&config, &storage)?;
    } else {
        let config = Arc::new(config);
        let trigger = Trigger::from_config(Arc::clone(&config), storage)?;
        watch_ctrl_c(&trigger);

        if cli.schedule {
            handle_schedule(&config, &trigger).await?;
        } else if cli.detect_only {
            handle_detect(&trigger).await?;
        } else {
            handle_crawl(&trigger, cli.fresh).await?;
            handle_detect(&trigger).await?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfwatch=info,warn"),
            1 => EnvFilter::new("shelfwatch=debug,info"),
            2 => EnvFilter::new("shelfwatch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Requests a cooperative stop of the running crawl on Ctrl-C
fn watch_ctrl_c(trigger: &Trigger) {
    let stop = trigger.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            stop.request_stop();
        }
    });
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Shelfwatch Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Target URL: {}", config.crawler.target_url);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Timeout: {}s", config.crawler.timeout_secs);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path.display());
    println!("  Reports: {}", config.output.reports_dir.display());

    println!("\nScheduler:");
    println!("  Enabled: {}", config.scheduler.enabled);
    println!("  Run time: {} UTC", config.scheduler.run_time);
    println!(
        "  Crawl before detect: {}",
        config.scheduler.crawl_before_detect
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, storage: &SharedStorage) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path.display());

    let stats = {
        let guard = storage::lock(storage)?;
        load_statistics(&*guard)?
    };
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-report mode: writes a change report from existing data
fn handle_export_report(config: &Config, storage: &SharedStorage) -> anyhow::Result<()> {
    println!("=== Exporting Change Report ===\n");

    let paths = write_change_reports(storage, &config.output.reports_dir, None)?;

    println!("✓ JSON report: {}", paths.json.display());
    println!("✓ Markdown report: {}", paths.markdown.display());

    Ok(())
}

/// Runs one crawl, resuming an interrupted run unless `fresh` is set
async fn handle_crawl(trigger: &Trigger, fresh: bool) -> anyhow::Result<()> {
    let mode = if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
        CrawlMode::Fresh
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
        CrawlMode::Resume
    };

    match trigger.trigger_crawl(mode).await? {
        Some(report) if report.was_stopped() => {
            anyhow::bail!("crawl stopped; run again to start over")
        }
        Some(report) => {
            let counters = &report.state.counters;
            tracing::info!(
                "Crawl {} in {:.1}s: {} items ({} new, {} updated, {} unchanged)",
                report.state.status,
                report.duration.as_secs_f64(),
                counters.items_processed,
                counters.items_new,
                counters.items_updated,
                counters.items_unchanged
            );
            Ok(())
        }
        None => {
            tracing::warn!("A crawl is already running");
            Ok(())
        }
    }
}

/// Runs one change detection pass
async fn handle_detect(trigger: &Trigger) -> anyhow::Result<()> {
    if let Some(summary) = trigger.trigger_change_detection().await? {
        println!(
            "Detection run {}: {} changes across {} items ({} failed)",
            summary.run_id, summary.changes_found, summary.items_scanned, summary.items_failed
        );
    }
    Ok(())
}

/// Handles the --schedule mode: runs the daily job until Ctrl-C
async fn handle_schedule(config: &Config, trigger: &Trigger) -> anyhow::Result<()> {
    if !config.scheduler.enabled {
        println!("Scheduler is disabled in configuration; nothing to do.");
        return Ok(());
    }

    let schedule = DailySchedule::from_config(config)?;
    tracing::info!("Scheduler started, daily run at {} UTC", config.scheduler.run_time);

    tokio::select! {
        _ = schedule.run(trigger) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Scheduler shutting down");
        }
    }

    Ok(())
}
