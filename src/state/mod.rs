//! State module for tracking crawl progress
//!
//! The crawl state is a singleton checkpoint: a cursor naming the next listing page
//! to process, the run status and the per-run counters. Only the coordinating task
//! of the orchestrator writes it.
//!
//! # Components
//!
//! - `RunStatus`: Lifecycle of a crawl run (not_started, in_progress, completed, failed)
//! - `CrawlState`: The persisted checkpoint, including `CrawlCursor` and `CrawlCounters`

mod crawl_state;
mod run_status;

// Re-export main types
pub use crawl_state::{CrawlCounters, CrawlCursor, CrawlState, CRAWLER_STATE_TYPE};
pub use run_status::RunStatus;
