use super::{CatalogRecord, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewItem,
    PriceChange,
    AvailabilityChange,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [
        ChangeKind::NewItem,
        ChangeKind::PriceChange,
        ChangeKind::AvailabilityChange,
    ];

    /// Convert to database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            ChangeKind::NewItem => "new_item",
            ChangeKind::PriceChange => "price_change",
            ChangeKind::AvailabilityChange => "availability_change",
        }
    }

    /// Parse from database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new_item" => Some(ChangeKind::NewItem),
            "price_change" => Some(ChangeKind::PriceChange),
            "availability_change" => Some(ChangeKind::AvailabilityChange),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Short description of an item, recorded as the new value of a `new_item` change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub title: String,
    pub category: String,
    pub price: Price,
}

impl From<&CatalogRecord> for ItemSummary {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            title: record.title.clone(),
            category: record.category.clone(),
            price: record.price_incl_tax,
        }
    }
}

/// A value on either side of a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ChangeValue {
    Price(Price),
    Availability(String),
    Item(ItemSummary),
}

impl fmt::Display for ChangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeValue::Price(p) => write!(f, "{}", p),
            ChangeValue::Availability(a) => f.write_str(a),
            ChangeValue::Item(s) => write!(f, "{} ({}, {})", s.title, s.category, s.price),
        }
    }
}

/// An append-only change log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Row id, `None` until persisted
    pub id: Option<i64>,
    pub item_url: String,
    pub kind: ChangeKind,
    pub prior: Option<ChangeValue>,
    pub new: ChangeValue,
    pub detected_at: DateTime<Utc>,
    pub item_title: String,
    /// Detection pass that produced this change
    pub run_id: i64,
}
