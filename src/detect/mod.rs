//! Change detection
//!
//! A detection pass drains the pending-detection queue filled by crawl upserts and
//! appends `new_item`, `price_change` and `availability_change` entries to the
//! change log. Prices are compared on the post-tax amount.

mod detector;
mod diff;

pub use detector::{ChangeDetector, DetectionItemError, DetectionSummary};
pub use diff::{diff_records, ChangeDraft};
