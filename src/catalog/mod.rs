//! Catalog data model
//!
//! Contains the item record persisted by the record store, the money type used for
//! exact price comparison, and the append-only change log entries.

mod change;
mod price;
mod record;

pub use change::{Change, ChangeKind, ChangeValue, ItemSummary};
pub use price::Price;
pub use record::{compute_fingerprint, CatalogRecord, ItemFields};
