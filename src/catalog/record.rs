use super::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Structured fields extracted from an item page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub title: String,
    /// Category from the page breadcrumb, if present
    pub category: Option<String>,
    pub description: Option<String>,
    pub price_excl_tax: Price,
    pub price_incl_tax: Price,
    pub availability: String,
    pub num_reviews: u32,
    pub rating: u8,
    pub image_url: Option<String>,
}

/// A catalog item as persisted in the record store, keyed by canonical URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub url: String,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub price_excl_tax: Price,
    pub price_incl_tax: Price,
    pub availability: String,
    pub num_reviews: u32,
    pub rating: u8,
    pub image_url: Option<String>,
    pub last_crawled: DateTime<Utc>,
    pub fingerprint: String,
    /// Page HTML as fetched; stored as a backup, never part of snapshots or the fingerprint
    #[serde(skip)]
    pub raw_html: Option<String>,
}

impl CatalogRecord {
    /// Builds a record from parsed fields
    ///
    /// `listing_category` is used when the item page carries no breadcrumb category.
    pub fn from_fields(
        url: impl Into<String>,
        listing_category: &str,
        fields: ItemFields,
        crawled_at: DateTime<Utc>,
    ) -> Self {
        let fingerprint = compute_fingerprint(
            fields.price_excl_tax,
            fields.price_incl_tax,
            &fields.availability,
            fields.rating,
            fields.num_reviews,
        );

        Self {
            url: url.into(),
            title: fields.title,
            category: fields
                .category
                .unwrap_or_else(|| listing_category.to_string()),
            description: fields.description,
            price_excl_tax: fields.price_excl_tax,
            price_incl_tax: fields.price_incl_tax,
            availability: fields.availability,
            num_reviews: fields.num_reviews,
            rating: fields.rating,
            image_url: fields.image_url,
            last_crawled: crawled_at,
            fingerprint,
            raw_html: None,
        }
    }

    /// Attaches the HTML the record was parsed from
    pub fn with_raw_html(mut self, html: impl Into<String>) -> Self {
        self.raw_html = Some(html.into());
        self
    }
}

/// Computes the content fingerprint over the change-relevant fields
///
/// The encoding is fixed-order and newline-separated, so an unchanged item always
/// hashes to the same hex digest.
pub fn compute_fingerprint(
    price_excl_tax: Price,
    price_incl_tax: Price,
    availability: &str,
    rating: u8,
    num_reviews: u32,
) -> String {
    let canonical = format!(
        "price_excl_tax={}\nprice_incl_tax={}\navailability={}\nrating={}\nnum_reviews={}",
        price_excl_tax.minor_units(),
        price_incl_tax.minor_units(),
        availability.trim(),
        rating,
        num_reviews
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
