//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that drives the resumable state machine:
//! - Loading the checkpoint and deciding between resume and a fresh traversal
//! - Walking categories and their listing pages in order
//! - Fanning item work out to bounded worker tasks
//! - Consolidating worker results and checkpointing after every page
//! - Handling stop requests and fatal errors

use crate::catalog::CatalogRecord;
use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{CatalogParser, Category, PageParser, ParseError};
use crate::crawler::stop::StopSignal;
use crate::state::{CrawlCursor, CrawlState, RunStatus};
use crate::storage::{self, SharedStorage, Storage, StorageError, UpsertOutcome};
use crate::url::canonical_item_url;
use crate::{Result, ShelfError};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use url::Url;

/// `last_error` recorded when a run ends on a stop request
pub const STOPPED_REASON: &str = "stopped";

/// How a crawl treats an existing in-progress checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrawlMode {
    /// Continue an interrupted run from its cursor
    #[default]
    Resume,
    /// Always start a new traversal
    Fresh,
}

/// Outcome of one crawl invocation
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub state: CrawlState,
    pub duration: Duration,
    pub resumed: bool,
}

impl CrawlReport {
    pub fn was_stopped(&self) -> bool {
        self.state.status == RunStatus::Failed
            && self.state.last_error.as_deref() == Some(STOPPED_REASON)
    }
}

/// Result reported by a worker for one item
#[derive(Debug)]
enum ItemOutcome {
    Stored { url: String, outcome: UpsertOutcome },
    FetchFailed,
    ParseFailed,
    StoreFailed(StorageError),
}

/// Result of processing one listing page
enum PageOutcome {
    Done { next_page: Option<Url> },
    ListingFailed,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    fetcher: Fetcher,
    parser: Arc<dyn PageParser>,
    workers: Arc<Semaphore>,
    stop: StopSignal,
}

impl Coordinator {
    /// Creates a coordinator using the default catalog parser
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `storage` - Shared record store
    pub fn new(config: Arc<Config>, storage: SharedStorage) -> Result<Self> {
        let fetcher = Fetcher::new(&config.crawler)?;
        let workers = Arc::new(Semaphore::new(config.crawler.concurrency.max(1) as usize));

        Ok(Self {
            config,
            storage,
            fetcher,
            parser: Arc::new(CatalogParser),
            workers,
            stop: StopSignal::new(),
        })
    }

    /// Replaces the page parser
    pub fn with_parser(mut self, parser: Arc<dyn PageParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Handle for requesting a cooperative stop
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Runs one crawl to completion, failure or stop
    ///
    /// Fatal errors mark the checkpoint failed and are returned. A stop request
    /// returns a report whose state is failed with `last_error` "stopped".
    pub async fn run(&self, mode: CrawlMode) -> Result<CrawlReport> {
        let start_time = Instant::now();
        let (mut state, resumed) = self.prepare_state(mode)?;

        let root = match Url::parse(&self.config.crawler.target_url) {
            Ok(url) => url,
            Err(e) => return Err(self.abort(&mut state, e.into())),
        };

        info!("Fetching catalog root {}", root);
        let categories = match self.fetch_categories(&root).await {
            Ok(categories) => categories,
            Err(e) => return Err(self.abort(&mut state, e)),
        };
        info!("Found {} categories", categories.len());

        let Some(start) = resume_position(&state, &categories) else {
            let err = ParseError::NoCategories(root.to_string()).into();
            return Err(self.abort(&mut state, err));
        };
        let mut position = Some(start);

        while let Some((index, current)) = position.take() {
            if self.stop.is_stop_requested() {
                info!(
                    "Stop requested; halting before {} page {}",
                    current.category, current.page
                );
                state.advance_to(current);
                state.fail(STOPPED_REASON)?;
                self.save_state(&state)?;
                return Ok(self.finish(state, start_time, resumed));
            }

            debug!(
                "Processing {} page {}: {}",
                current.category, current.page, current.page_url
            );

            let next_in_category = match self.process_page(&current, &mut state).await {
                Ok(PageOutcome::Done { next_page }) => {
                    state.counters.pages_processed += 1;
                    next_page
                }
                Ok(PageOutcome::ListingFailed) => {
                    state.counters.pages_failed += 1;
                    warn!(
                        "Abandoning category {} after listing page {} failed",
                        current.category, current.page
                    );
                    None
                }
                Err(e) => return Err(self.abort(&mut state, e)),
            };

            // Checkpoint: the cursor names the next page to process
            position = match next_in_category {
                Some(page_url) => Some((
                    index,
                    CrawlCursor {
                        category: current.category.clone(),
                        page: current.page + 1,
                        page_url: page_url.to_string(),
                    },
                )),
                None => categories
                    .get(index + 1)
                    .map(|next| (index + 1, first_page(next))),
            };

            match &position {
                Some((_, cursor)) => state.advance_to(cursor.clone()),
                None => state.transition(RunStatus::Completed)?,
            }
            if let Err(e) = self.save_state(&state) {
                return Err(self.abort(&mut state, e));
            }

            if state.counters.pages_processed % 10 == 0 && state.counters.pages_processed > 0 {
                let elapsed = start_time.elapsed();
                info!(
                    "Progress: {} pages, {} items processed, {:.2} items/sec",
                    state.counters.pages_processed,
                    state.counters.items_processed,
                    state.counters.items_processed as f64 / elapsed.as_secs_f64().max(0.001)
                );
            }
        }

        Ok(self.finish(state, start_time, resumed))
    }

    /// Loads the checkpoint and returns the state to run with
    fn prepare_state(&self, mode: CrawlMode) -> Result<(CrawlState, bool)> {
        let stored = storage::lock(&self.storage)?.load_crawl_state()?;

        let (state, resumed) = match (mode, stored.is_resumable()) {
            (CrawlMode::Resume, true) => {
                match &stored.cursor {
                    Some(cursor) => info!(
                        "Resuming interrupted crawl at {} page {} ({} items processed so far)",
                        cursor.category, cursor.page, stored.counters.items_processed
                    ),
                    None => info!("Resuming interrupted crawl from the first category"),
                }
                (stored, true)
            }
            (CrawlMode::Fresh, true) => {
                info!("Discarding interrupted crawl; starting fresh");
                (CrawlState::begin(Utc::now()), false)
            }
            (_, false) => {
                info!("Starting new crawl (previous status: {})", stored.status);
                (CrawlState::begin(Utc::now()), false)
            }
        };

        self.save_state(&state)?;
        Ok((state, resumed))
    }

    async fn fetch_categories(&self, root: &Url) -> Result<Vec<Category>> {
        let html = self.fetcher.fetch(root).await?;
        Ok(self.parser.categories(&html, root)?)
    }

    /// Fetches a listing page and runs every item on it through the workers
    ///
    /// Returns only after all item results for the page have been consolidated.
    async fn process_page(
        &self,
        current: &CrawlCursor,
        state: &mut CrawlState,
    ) -> Result<PageOutcome> {
        let page_url = Url::parse(&current.page_url)?;

        let html = match self.fetcher.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to fetch listing {}: {}", page_url, e);
                return Ok(PageOutcome::ListingFailed);
            }
        };
        let listing = match self.parser.listing(&html, &page_url) {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Failed to parse listing {}: {}", page_url, e);
                return Ok(PageOutcome::ListingFailed);
            }
        };

        let expected = listing.item_urls.len();
        let (tx, mut rx) = mpsc::channel::<ItemOutcome>(expected.max(1));

        for url in listing.item_urls {
            let permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|_| ShelfError::Worker("worker pool closed".to_string()))?;
            let tx = tx.clone();
            let fetcher = self.fetcher.clone();
            let parser = Arc::clone(&self.parser);
            let storage = Arc::clone(&self.storage);
            let category = current.category.clone();

            tokio::spawn(async move {
                let outcome = process_item(&fetcher, parser.as_ref(), &storage, &category, url).await;
                drop(permit);
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut received = 0;
        let mut store_error = None;
        while let Some(outcome) = rx.recv().await {
            received += 1;
            let counters = &mut state.counters;
            match outcome {
                ItemOutcome::Stored { url, outcome } => {
                    counters.items_processed += 1;
                    match outcome {
                        UpsertOutcome::Inserted => counters.items_new += 1,
                        UpsertOutcome::Updated { .. } => counters.items_updated += 1,
                        UpsertOutcome::Unchanged => counters.items_unchanged += 1,
                    }
                    state.last_item_url = Some(url);
                }
                ItemOutcome::FetchFailed => counters.fetch_failures += 1,
                ItemOutcome::ParseFailed => counters.parse_failures += 1,
                ItemOutcome::StoreFailed(e) => {
                    counters.store_failures += 1;
                    store_error.get_or_insert(e);
                }
            }
        }

        if received < expected {
            let lost = (expected - received) as u64;
            error!("{} item workers on {} ended without reporting", lost, page_url);
            state.counters.store_failures += lost;
        }

        if let Some(e) = store_error {
            return Err(e.into());
        }

        Ok(PageOutcome::Done {
            next_page: listing.next_page,
        })
    }

    fn save_state(&self, state: &CrawlState) -> Result<()> {
        storage::lock(&self.storage)?.save_crawl_state(state)?;
        Ok(())
    }

    /// Marks the run failed and returns the error to surface
    fn abort(&self, state: &mut CrawlState, err: ShelfError) -> ShelfError {
        let c = &state.counters;
        error!(
            "Crawl failed: {}; {} items processed ({} new, {} updated, {} unchanged), {} skipped, {} failed, {} pages ({} failed)",
            err,
            c.items_processed,
            c.items_new,
            c.items_updated,
            c.items_unchanged,
            c.items_skipped(),
            c.items_failed(),
            c.pages_processed,
            c.pages_failed
        );
        if state.fail(err.to_string()).is_ok() {
            if let Err(save_err) = self.save_state(state) {
                error!("Could not record failed crawl state: {}", save_err);
            }
        }
        err
    }

    fn finish(&self, state: CrawlState, start_time: Instant, resumed: bool) -> CrawlReport {
        let duration = start_time.elapsed();
        let c = &state.counters;
        info!(
            "Crawl {}: {} items processed ({} new, {} updated, {} unchanged), {} skipped, {} failed, {} pages ({} failed) in {:.1}s",
            state.status,
            c.items_processed,
            c.items_new,
            c.items_updated,
            c.items_unchanged,
            c.items_skipped(),
            c.items_failed(),
            c.pages_processed,
            c.pages_failed,
            duration.as_secs_f64()
        );
        CrawlReport {
            state,
            duration,
            resumed,
        }
    }
}

/// Fetches, parses and upserts one item
async fn process_item(
    fetcher: &Fetcher,
    parser: &dyn PageParser,
    storage: &SharedStorage,
    category: &str,
    url: Url,
) -> ItemOutcome {
    let url = match canonical_item_url(url.as_str()) {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!("Skipping item {}: {}", url, e);
            return ItemOutcome::ParseFailed;
        }
    };

    let html = match fetcher.fetch(&url).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Skipping item {}: {}", url, e);
            return ItemOutcome::FetchFailed;
        }
    };

    let fields = match parser.item(&html, &url) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("Skipping item: {}", e);
            return ItemOutcome::ParseFailed;
        }
    };

    let record =
        CatalogRecord::from_fields(url.as_str(), category, fields, Utc::now()).with_raw_html(html);
    let result = storage::lock(storage).and_then(|mut s| s.upsert_item(&record));
    match result {
        Ok(outcome) => {
            debug!("{} {}", outcome.label(), record.url);
            ItemOutcome::Stored {
                url: record.url,
                outcome,
            }
        }
        Err(e) => {
            error!("Failed to store {}: {}", record.url, e);
            ItemOutcome::StoreFailed(e)
        }
    }
}

fn first_page(category: &Category) -> CrawlCursor {
    CrawlCursor {
        category: category.name.clone(),
        page: 1,
        page_url: category.url.to_string(),
    }
}

/// Picks the page to start from: the checkpoint cursor if its category still
/// exists, otherwise the first page of the first category
fn resume_position(state: &CrawlState, categories: &[Category]) -> Option<(usize, CrawlCursor)> {
    if let Some(cursor) = &state.cursor {
        if let Some(index) = categories.iter().position(|c| c.name == cursor.category) {
            return Some((index, cursor.clone()));
        }
        warn!(
            "Checkpoint category {:?} no longer exists; restarting from the first category",
            cursor.category
        );
    }
    categories.first().map(|first| (0, first_page(first)))
}
