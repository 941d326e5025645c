use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A price held in integer minor units (pence, cents)
///
/// Catalog prices carry two decimals. Keeping them as integers makes equality and
/// the content fingerprint exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_minor_units(units: i64) -> Self {
        Self(units)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parses a displayed price such as "£51.77", "$ 12.00" or "12"
    ///
    /// Currency symbols, thousands separators and whitespace are ignored. Returns
    /// `None` when no number can be recovered.
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let (whole, frac) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if frac.contains('.') {
            return None;
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().ok()?
        };

        // Round to two decimals on the third digit
        let digits: Vec<u32> = frac.chars().filter_map(|c| c.to_digit(10)).collect();
        let mut cents = i64::from(*digits.first().unwrap_or(&0)) * 10
            + i64::from(*digits.get(1).unwrap_or(&0));
        if digits.get(2).copied().unwrap_or(0) >= 5 {
            cents += 1;
        }

        whole.checked_mul(100)?.checked_add(cents).map(Price)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Price {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Price::parse(s).ok_or_else(|| format!("not a price: {:?}", s))
    }
}
