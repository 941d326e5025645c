//! Mock catalog served by wiremock, shared by the integration tests

#![allow(dead_code)]

use shelfwatch::config::{Config, CrawlerConfig, OutputConfig, SchedulerConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone)]
pub struct ItemFixture {
    pub slug: String,
    pub title: String,
    pub price: String,
    pub availability: String,
    /// Linked from its listing but answered with 404
    pub broken: bool,
}

#[derive(Debug, Clone)]
pub struct CategoryFixture {
    pub name: String,
    pub slug: String,
    /// Listing pages in order, each with its items
    pub pages: Vec<Vec<ItemFixture>>,
    /// Linked from the root but its listing pages answer 404
    pub broken: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogFixture {
    pub categories: Vec<CategoryFixture>,
    pub root_delay: Duration,
    /// Category slug and 1-based page whose listing answers only after a delay
    pub slow_listing: Option<(String, usize, Duration)>,
}

pub fn item(slug: &str, price: &str, availability: &str) -> ItemFixture {
    ItemFixture {
        slug: slug.to_string(),
        title: format!("Title of {}", slug),
        price: price.to_string(),
        availability: availability.to_string(),
        broken: false,
    }
}

pub fn category(name: &str, pages: Vec<Vec<ItemFixture>>) -> CategoryFixture {
    CategoryFixture {
        name: name.to_string(),
        slug: name.to_lowercase(),
        pages,
        broken: false,
    }
}

/// Travel spans two listing pages (a, b then c); Mystery has one (d, e)
pub fn sample_catalog() -> CatalogFixture {
    CatalogFixture {
        categories: vec![
            category(
                "Travel",
                vec![
                    vec![
                        item("a-walk-in-the-woods", "£10.00", "In stock (5 available)"),
                        item("full-moon-over-noahs-ark", "£49.43", "In stock (15 available)"),
                    ],
                    vec![item("vagabonding", "£36.94", "In stock (3 available)")],
                ],
            ),
            category(
                "Mystery",
                vec![vec![
                    item("sharp-objects", "£47.82", "In stock (20 available)"),
                    item("in-a-dark-dark-wood", "£19.63", "In stock (1 available)"),
                ]],
            ),
        ],
        root_delay: Duration::ZERO,
        slow_listing: None,
    }
}

impl CatalogFixture {
    pub fn item_count(&self) -> u64 {
        self.categories
            .iter()
            .flat_map(|c| c.pages.iter().flatten())
            .filter(|i| !i.broken)
            .count() as u64
    }

    pub fn item_mut(&mut self, slug: &str) -> &mut ItemFixture {
        self.categories
            .iter_mut()
            .flat_map(|c| c.pages.iter_mut().flatten())
            .find(|i| i.slug == slug)
            .expect("fixture item exists")
    }

    /// Replaces every mock on the server with this catalog
    pub async fn remount(&self, server: &MockServer) {
        server.reset().await;
        self.mount(server).await;
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(root_page(&self.categories)).set_delay(self.root_delay))
            .mount(server)
            .await;

        for category in &self.categories {
            if category.broken {
                continue;
            }
            let page_count = category.pages.len();
            for (index, items) in category.pages.iter().enumerate() {
                let page = index + 1;
                let delay = match &self.slow_listing {
                    Some((slug, slow_page, delay)) if *slug == category.slug && *slow_page == page => {
                        *delay
                    }
                    _ => Duration::ZERO,
                };
                Mock::given(method("GET"))
                    .and(path(listing_path(&category.slug, page)))
                    .respond_with(
                        html(listing_page(items, page < page_count, page + 1)).set_delay(delay),
                    )
                    .mount(server)
                    .await;

                for item in items.iter().filter(|i| !i.broken) {
                    Mock::given(method("GET"))
                        .and(path(format!("/catalogue/{}/index.html", item.slug)))
                        .respond_with(html(item_page(item)))
                        .mount(server)
                        .await;
                }
            }
        }
    }
}

/// Canonical URL the crawler stores for an item fixture
pub fn item_url(server: &MockServer, slug: &str) -> String {
    format!("{}/catalogue/{}/index.html", server.uri(), slug)
}

pub fn listing_url(server: &MockServer, category_slug: &str, page: usize) -> String {
    format!("{}{}", server.uri(), listing_path(category_slug, page))
}

pub fn test_config(server: &MockServer, dir: &Path) -> Arc<Config> {
    Arc::new(Config {
        crawler: CrawlerConfig {
            target_url: format!("{}/", server.uri()),
            concurrency: 4,
            timeout_secs: 5,
            max_retries: 1,
            retry_delay_ms: 10,
            user_agent: "shelfwatch-tests".to_string(),
        },
        output: OutputConfig {
            database_path: dir.join("shelf.db"),
            reports_dir: dir.join("reports"),
        },
        scheduler: SchedulerConfig::default(),
    })
}

fn listing_path(category_slug: &str, page: usize) -> String {
    if page == 1 {
        format!("/catalogue/category/{}/index.html", category_slug)
    } else {
        format!("/catalogue/category/{}/page-{}.html", category_slug, page)
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn root_page(categories: &[CategoryFixture]) -> String {
    let links: String = categories
        .iter()
        .map(|c| {
            format!(
                r#"<li><a href="catalogue/category/{}/index.html">{}</a></li>"#,
                c.slug, c.name
            )
        })
        .collect();

    format!(
        r#"<html><body><ul class="nav nav-list">
        <li><a href="catalogue/category/books_1/index.html">Books</a><ul>{}</ul></li>
        </ul></body></html>"#,
        links
    )
}

fn listing_page(items: &[ItemFixture], has_next: bool, next_page: usize) -> String {
    let pods: String = items
        .iter()
        .map(|i| {
            format!(
                r#"<li><article class="product_pod"><h3><a href="../../{}/index.html">{}</a></h3></article></li>"#,
                i.slug, i.title
            )
        })
        .collect();
    let next = if has_next {
        format!(r#"<li class="next"><a href="page-{}.html">next</a></li>"#, next_page)
    } else {
        String::new()
    };

    format!(
        r#"<html><body><ol class="row">{}</ol><ul class="pager">{}</ul></body></html>"#,
        pods, next
    )
}

fn item_page(item: &ItemFixture) -> String {
    format!(
        r#"<html><body>
        <div class="product_main">
          <h1>{title}</h1>
          <p class="price_color">{price}</p>
          <p class="star-rating Four"><i class="icon-star"></i></p>
        </div>
        <table class="table table-striped">
          <tr><th>UPC</th><td>{slug}</td></tr>
          <tr><th>Price (excl. tax)</th><td>{price}</td></tr>
          <tr><th>Price (incl. tax)</th><td>{price}</td></tr>
          <tr><th>Availability</th><td>{availability}</td></tr>
          <tr><th>Number of reviews</th><td>0</td></tr>
        </table>
        </body></html>"#,
        title = item.title,
        price = item.price,
        availability = item.availability,
        slug = item.slug,
    )
}
