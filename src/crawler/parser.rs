//! HTML parser for catalog pages
//!
//! This module turns raw pages into structured data:
//! - The category list on the catalog root
//! - Item links and the next-page link on a listing page
//! - Item fields on an item page
//!
//! The orchestrator only sees the `PageParser` trait; `CatalogParser` understands
//! the reference catalog markup (`article.product_pod` listings, `li.next`
//! pagination, a `table-striped` product information table).

use crate::catalog::{ItemFields, Price};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Errors produced while parsing a page
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing required fields on {url}: {}", .fields.join(", "))]
    MissingFields {
        url: String,
        fields: Vec<&'static str>,
    },

    #[error("invalid {field} on {url}: {value:?}")]
    InvalidField {
        url: String,
        field: &'static str,
        value: String,
    },

    #[error("no categories found on {0}")]
    NoCategories(String),
}

/// A catalog category discovered on the root page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: Url,
}

/// Contents of one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Absolute item URLs, in page order
    pub item_urls: Vec<Url>,
    pub next_page: Option<Url>,
}

/// Page parser used by the orchestrator
pub trait PageParser: Send + Sync {
    /// Extracts the categories from the catalog root page
    fn categories(&self, html: &str, base_url: &Url) -> Result<Vec<Category>, ParseError>;

    /// Extracts item links and the next-page link from a listing page
    fn listing(&self, html: &str, base_url: &Url) -> Result<Listing, ParseError>;

    /// Extracts item fields from an item page
    fn item(&self, html: &str, url: &Url) -> Result<ItemFields, ParseError>;
}

/// Parser for the reference catalog markup
#[derive(Debug, Clone, Default)]
pub struct CatalogParser;

impl PageParser for CatalogParser {
    fn categories(&self, html: &str, base_url: &Url) -> Result<Vec<Category>, ParseError> {
        let document = Html::parse_document(html);
        let mut categories = Vec::new();

        // The first nav-list entry is the all-items root, not a category
        for element in select_all(&document, "ul.nav-list a").into_iter().skip(1) {
            let name = clean_text(&element_text(&element));
            let url = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url));
            if let (false, Some(url)) = (name.is_empty(), url) {
                categories.push(Category { name, url });
            }
        }

        if categories.is_empty() {
            return Err(ParseError::NoCategories(base_url.to_string()));
        }
        Ok(categories)
    }

    fn listing(&self, html: &str, base_url: &Url) -> Result<Listing, ParseError> {
        let document = Html::parse_document(html);

        let item_urls = select_all(&document, "article.product_pod h3 a")
            .into_iter()
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_link(href, base_url))
            .collect();

        let next_page = select_first(&document, "li.next a")
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_link(href, base_url));

        Ok(Listing {
            item_urls,
            next_page,
        })
    }

    fn item(&self, html: &str, url: &Url) -> Result<ItemFields, ParseError> {
        let document = Html::parse_document(html);
        let table = product_table(&document);
        let mut missing = Vec::new();

        let title = select_first(&document, "h1")
            .map(|h| clean_text(&element_text(&h)))
            .unwrap_or_default();
        if title.is_empty() {
            missing.push("title");
        }

        let category = select_all(&document, "ul.breadcrumb li a")
            .get(2)
            .map(|a| clean_text(&element_text(a)))
            .filter(|c| !c.is_empty());

        let description = select_first(&document, "#product_description ~ p")
            .map(|p| clean_text(&element_text(&p)))
            .filter(|d| !d.is_empty());

        let fallback_price = select_first(&document, "p.price_color").map(|p| element_text(&p));
        let price_incl_tax = parse_price(
            url,
            "price_incl_tax",
            table_value(&table, "Price (incl. tax)").or(fallback_price.clone()),
        )?;
        let price_excl_tax = parse_price(
            url,
            "price_excl_tax",
            table_value(&table, "Price (excl. tax)").or(fallback_price),
        )?;
        match price_incl_tax {
            Some(p) if p.is_positive() => {}
            _ => missing.push("price_incl_tax"),
        }
        if matches!(price_excl_tax, Some(p) if !p.is_positive()) {
            missing.push("price_excl_tax");
        }

        let availability = table_value(&table, "Availability")
            .or_else(|| select_first(&document, "p.availability").map(|p| element_text(&p)))
            .map(|a| clean_text(&a))
            .unwrap_or_default();

        let num_reviews = table_value(&table, "Number of reviews")
            .and_then(|n| clean_text(&n).parse::<u32>().ok())
            .unwrap_or(0);

        let rating = select_first(&document, "p.star-rating")
            .and_then(|p| p.value().classes().find_map(rating_from_class))
            .unwrap_or(0);
        if rating == 0 {
            missing.push("rating");
        }

        let image_url = select_first(&document, "#product_gallery img")
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| resolve_link(src, url))
            .map(|u| u.to_string());

        if !missing.is_empty() {
            return Err(ParseError::MissingFields {
                url: url.to_string(),
                fields: missing,
            });
        }

        let price_incl_tax = price_incl_tax.unwrap_or(Price::ZERO);
        Ok(ItemFields {
            title,
            category,
            description,
            price_excl_tax: price_excl_tax.unwrap_or(price_incl_tax),
            price_incl_tax,
            availability,
            num_reviews,
            rating,
            image_url,
        })
    }
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Rows of the product information table as (header, value) pairs
fn product_table(document: &Html) -> Vec<(String, String)> {
    let (Ok(th), Ok(td)) = (Selector::parse("th"), Selector::parse("td")) else {
        return Vec::new();
    };

    select_all(document, "table.table-striped tr")
        .into_iter()
        .filter_map(|row| {
            let header = row.select(&th).next().map(|h| clean_text(&element_text(&h)))?;
            let value = row.select(&td).next().map(|d| element_text(&d))?;
            Some((header, value))
        })
        .collect()
}

fn table_value(table: &[(String, String)], header: &str) -> Option<String> {
    table
        .iter()
        .find(|(h, _)| h.eq_ignore_ascii_case(header))
        .map(|(_, v)| v.clone())
}

fn parse_price(
    url: &Url,
    field: &'static str,
    text: Option<String>,
) -> Result<Option<Price>, ParseError> {
    match text {
        None => Ok(None),
        Some(text) => Price::parse(&text).map(Some).ok_or_else(|| ParseError::InvalidField {
            url: url.to_string(),
            field,
            value: clean_text(&text),
        }),
    }
}

fn rating_from_class(class: &str) -> Option<u8> {
    match class {
        "One" => Some(1),
        "Two" => Some(2),
        "Three" => Some(3),
        "Four" => Some(4),
        "Five" => Some(5),
        _ => None,
    }
}

/// Collapses runs of whitespace and trims
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a link href against a base URL
///
/// Returns None for empty, fragment-only, non-HTTP(S) and unparseable links.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url)
    } else {
        None
    }
}
