//! Site configuration: compiled selectors, link patterns, and crawl options.
//!
//! Everything the navigator, walker, and extractor need to know about the
//! site's markup lives in one immutable [`SiteConfig`] value, constructed
//! once and passed by reference. Swapping in a config for a different
//! template version (or a test fixture) never touches global state.

use anyhow::{anyhow, Result};
use regex::Regex;
use scraper::Selector;
use std::path::PathBuf;
use std::str::FromStr;

/// Default desktop user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0 Safari/537.36";

/// Immutable selector and pattern tables for one site template version.
pub struct SiteConfig {
    /// Site origin, e.g. `http://www.etmoc.com`.
    pub origin: String,
    /// Cookie domain derived from the origin.
    pub host: String,

    /// Primary content column of catalog and product pages.
    pub content_column: Selector,
    /// Product-detail anchors inside the catalog's content column.
    pub catalog_product_links: Selector,
    /// Product title element.
    pub product_title: Selector,
    /// Alternate-name sub-element nested in the title.
    pub title_alternate: Selector,
    /// `<title>` fallback.
    pub document_title: Selector,
    /// Primary image inside the image container.
    pub primary_image: Selector,
    /// Attribute-row containers on a product page.
    pub attribute_rows: Selector,
    /// Leading label element of an attribute block.
    pub row_label: Selector,
    /// Anchor carrying the total page count.
    pub total_pages_anchor: Selector,
    /// All pagination/navigation anchors (total-pages fallback scan).
    pub nav_links: Selector,
    /// Structural "next page" candidates, tried in order.
    pub pagination_candidates: Vec<Selector>,
    /// Last anchor of a recognized pagination container.
    pub pagination_last_anchor: Selector,
    /// Any anchor with an href (free-text fallback scan).
    pub anchors: Selector,

    /// Content column as a CSS string (in-page JS evaluation).
    pub content_column_css: String,
    /// Ready selector for catalog pages (CSS string, used by selector waits).
    pub catalog_ready_css: String,
    /// Ready selector for product pages.
    pub product_ready_css: String,
    /// Total-pages anchor as a CSS string for waits.
    pub total_pages_anchor_css: String,

    /// "Next page" glyphs and words.
    pub next_text: Regex,
    /// Product detail link pattern.
    pub product_link: Regex,
    /// Brand listing link pattern.
    pub brand_link: Regex,
    /// `page=N` URL parameter.
    pub page_param: Regex,
    /// First run of digits.
    pub digits: Regex,
    /// Full year-month-day (calendar terms, month/day optional).
    pub date_full: Regex,
    /// Bare four-digit year starting with 20.
    pub date_year: Regex,
    /// Boilerplate phrases that leak into attribute values.
    pub boilerplate: Regex,
    /// Attribute labels holding date-like values.
    pub date_keys: Vec<String>,
}

fn sel(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

impl SiteConfig {
    /// Selector tables for the current etmoc.com template.
    pub fn etmoc() -> Result<Self> {
        Self::for_origin("http://www.etmoc.com")
    }

    /// Same tables against a different origin (test servers, mirrors).
    pub fn for_origin(origin: &str) -> Result<Self> {
        let host = url::Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| anyhow!("origin has no host: {origin}"))?;

        let content_column_css = "body > div.container > div.row > div.col-8";
        let catalog_links_css = "body > div.container > div.row > div.col-8 > ul a[href*=\"Product?Id=\"]";

        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            host,
            content_column: sel(content_column_css)?,
            catalog_product_links: sel(catalog_links_css)?,
            product_title: sel("div.brand-title > h2")?,
            title_alternate: sel("small")?,
            document_title: sel("title")?,
            primary_image: sel("div.proImg img[src]")?,
            attribute_rows: sel("div.proBars div.proBar")?,
            row_label: sel("span")?,
            total_pages_anchor: sel("body > div.container > nav > ul > li:nth-child(12) > a")?,
            nav_links: sel("body > div.container nav ul li a[href]")?,
            pagination_candidates: vec![
                sel("nav.pagination a[rel=\"next\"]")?,
                sel("ul.pagination li.next a")?,
                sel(".pagination a.next")?,
                sel(".pager a.next")?,
            ],
            pagination_last_anchor: sel(".pagination a[href]:last-child")?,
            anchors: sel("a[href]")?,
            content_column_css: content_column_css.to_string(),
            catalog_ready_css: catalog_links_css.to_string(),
            product_ready_css: "div.brand-title > h2, h1, .title, .product-title".to_string(),
            total_pages_anchor_css: "body > div.container > nav > ul > li:nth-child(12) > a"
                .to_string(),
            next_text: Regex::new("(下一页|下页|›|»)")?,
            product_link: Regex::new(r"(?i)Product\?Id=\d+")?,
            brand_link: Regex::new(r"(?i)BrandShow\?Id=\d+")?,
            page_param: Regex::new(r"page=(\d+)")?,
            digits: Regex::new(r"\d+")?,
            date_full: Regex::new(r"(20\d{2})\s*年(?:\s*(\d{1,2})\s*月(?:\s*(\d{1,2})\s*日)?)?")?,
            date_year: Regex::new(r"(20\d{2})")?,
            boilerplate: Regex::new(
                "(在线评分|同品牌产品|真伪鉴别|首页|关于我们|免责声明|用户协议|站点地图|版权所有)",
            )?,
            date_keys: vec!["上市时间".to_string(), "发行时间".to_string()],
        })
    }

    /// Paginated directory root (`<origin>/Firms/Brands`).
    pub fn directory_root(&self) -> String {
        format!("{}/Firms/Brands", self.origin)
    }

    /// Directory page N in numeric pagination mode.
    pub fn directory_page(&self, index: u32) -> String {
        format!("{}?page={index}", self.directory_root())
    }

    /// Product detail page for a numeric product id.
    pub fn product_url(&self, id: u32) -> String {
        format!("{}/Firms/Product?Id={id}", self.origin)
    }

    /// Referrer URL encoded into the verification cookie.
    pub fn verify_referrer(&self) -> String {
        format!("{}/Firms/BrandAll", self.origin)
    }

    /// Verification endpoint carrying the device fingerprint.
    pub fn verify_url(&self, fingerprint_hex: &str) -> String {
        format!(
            "{}/Firms/BrandAll?security_verify_data={fingerprint_hex}",
            self.origin
        )
    }
}

/// Where a numeric-mode walk starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPage {
    /// Explicit 1-based page index.
    Index(u32),
    /// Continue from the checkpoint's last completed page + 1.
    Latest,
}

impl FromStr for StartPage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(StartPage::Latest);
        }
        s.parse::<u32>()
            .map(StartPage::Index)
            .map_err(|_| format!("start page must be an integer or 'latest', got {s:?}"))
    }
}

/// Parameters of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Maximum links to collect / records to extract; 0 = unbounded.
    pub limit: usize,
    /// Seconds slept between page fetches.
    pub delay: f64,
    /// Output directory.
    pub out_dir: PathBuf,
    /// Maximum catalog pages to visit; 0 = unbounded.
    pub pages_limit: u32,
    /// Start page for numeric pagination mode.
    pub start_page: Option<StartPage>,
    /// Incremental run: keep output dir, write a resume checkpoint.
    pub incremental: bool,
    /// Abort image/media/font/stylesheet requests at the network layer.
    pub block_resources: bool,
    /// Download each record's primary image after extraction.
    pub download_images: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            delay: 0.7,
            out_dir: PathBuf::from("etmoc_output"),
            pages_limit: 0,
            start_page: None,
            incremental: false,
            block_resources: true,
            download_images: false,
        }
    }
}

impl CrawlOptions {
    /// Numeric pagination mode: explicit start page or incremental run.
    pub fn numeric_mode(&self) -> bool {
        self.start_page.is_some() || self.incremental
    }
}
