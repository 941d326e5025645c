//! Read-only query types for the item and change projections

use crate::catalog::{CatalogRecord, ChangeKind, Price};
use serde::Serialize;

/// Hard upper bound on the number of changes returned by one query
pub const MAX_CHANGE_LIMIT: usize = 1000;

/// Default page size for item listings
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Sort key for item listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemSort {
    #[default]
    Title,
    Price,
    Rating,
    Reviews,
    LastCrawled,
}

impl ItemSort {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            ItemSort::Title => "title",
            ItemSort::Price => "price_incl_tax",
            ItemSort::Rating => "rating",
            ItemSort::Reviews => "num_reviews",
            ItemSort::LastCrawled => "last_crawled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "title" => Some(ItemSort::Title),
            "price" => Some(ItemSort::Price),
            "rating" => Some(ItemSort::Rating),
            "reviews" | "num_reviews" => Some(ItemSort::Reviews),
            "last_crawled" => Some(ItemSort::LastCrawled),
            _ => None,
        }
    }
}

/// Filtered, sorted, paginated item listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub min_rating: Option<u8>,
    pub sort: ItemSort,
    pub descending: bool,
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            category: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            sort: ItemSort::default(),
            descending: false,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ItemQuery {
    /// Row offset of the requested page
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1) * self.limit
    }
}

/// One page of an item listing
#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub items: Vec<CatalogRecord>,
    /// Total matches across all pages
    pub total: u64,
    pub page: usize,
    pub limit: usize,
}

/// Change log request, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    pub kind: Option<ChangeKind>,
    pub limit: usize,
}

impl Default for ChangeQuery {
    fn default() -> Self {
        Self {
            kind: None,
            limit: 100,
        }
    }
}

impl ChangeQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.min(MAX_CHANGE_LIMIT)
    }
}
