//! Crawler module for catalog harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded concurrency and retry
//! - Parsing of catalog root, listing and item pages
//! - The resumable crawl orchestrator and its stop signal

mod coordinator;
mod fetcher;
mod parser;
mod stop;

pub use coordinator::{Coordinator, CrawlMode, CrawlReport, STOPPED_REASON};
pub use fetcher::{build_http_client, FetchError, FetchPolicy, Fetcher};
pub use parser::{clean_text, CatalogParser, Category, Listing, PageParser, ParseError};
pub use stop::StopSignal;
