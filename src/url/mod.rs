//! URL handling for catalog items
//!
//! Item URLs are the unique key of the record store, so every URL discovered on a
//! listing page is canonicalized before it is fetched or persisted.

mod normalize;

pub use normalize::canonical_item_url;
