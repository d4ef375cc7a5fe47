//! Catalog traversal: ordered, deduplicated product-link collection.
//!
//! Two mutually exclusive navigation strategies per walk: numeric mode
//! constructs `?page=N` URLs (explicit start page or incremental runs),
//! link mode follows the in-page "next" control. Both respect page and
//! link limits, throttle between fetches, and degrade on slow pages
//! instead of aborting the whole run.

use crate::checkpoint::{self, CatalogCheckpoint};
use crate::config::{CrawlOptions, SiteConfig, StartPage};
use crate::driver::{DriverError, PageDriver, NAV_TIMEOUT_MS, READY_TIMEOUT_MS};
use crate::pagination;
use crate::throttle::Throttle;
use crate::urls;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Fixed settle delay after a navigation or ready-wait timeout.
const TIMEOUT_SETTLE: Duration = Duration::from_millis(800);

/// Transient traversal state of one walk.
#[derive(Debug, Clone, Copy)]
pub struct PaginationState {
    /// 1-based index of the page being processed.
    pub page_index: u32,
    /// Site-reported page count; 0 = unknown, no bound enforceable.
    pub total_pages: u32,
    /// `?page=N` construction instead of next-link following.
    pub numeric_mode: bool,
}

/// Walk the catalog and collect product-detail links in discovery order,
/// deduplicated by absolute URL.
///
/// The walk ends at the link limit, the page limit, the site's total page
/// count, a failed page load, or (in link mode) a missing next link. In
/// incremental runs the last completed page is checkpointed on the way
/// out; checkpoint write failures are swallowed.
pub async fn collect_catalog_links(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    opts: &CrawlOptions,
) -> Vec<String> {
    let root_url = cfg.directory_root();
    let numeric_mode = opts.numeric_mode();

    let mut state = PaginationState {
        page_index: 1,
        total_pages: detect_total_pages(driver, cfg, &root_url).await,
        numeric_mode,
    };

    if numeric_mode {
        state.page_index = resolve_start_page(opts);
    } else if !goto_and_ready(driver, cfg, &root_url).await {
        warn!("directory root failed to load, ending walk");
        return Vec::new();
    }

    let throttle = Throttle::new(opts.delay);
    let mut seen = HashSet::new();
    let mut links: Vec<String> = Vec::new();
    let mut pages_processed: u32 = 0;

    loop {
        if state.total_pages > 0 && state.page_index > state.total_pages {
            break;
        }
        if numeric_mode {
            let page_url = cfg.directory_page(state.page_index);
            if !goto_and_ready(driver, cfg, &page_url).await {
                warn!("directory page {} failed to load, ending walk", state.page_index);
                break;
            }
        }

        let html = match driver.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("reading directory page {}: {e}", state.page_index);
                break;
            }
        };
        let base = driver.current_url().await;
        let page_links = catalog_page_links(&html, &base, cfg);
        if state.total_pages > 0 {
            info!(
                "directory page {}/{}: {} product links",
                state.page_index,
                state.total_pages,
                page_links.len()
            );
        } else {
            info!(
                "directory page {}: {} product links",
                state.page_index,
                page_links.len()
            );
        }

        for url in page_links {
            if seen.contains(&url) {
                continue;
            }
            if opts.limit > 0 && links.len() >= opts.limit {
                break;
            }
            seen.insert(url.clone());
            links.push(url);
        }

        if opts.limit > 0 && links.len() >= opts.limit {
            break;
        }
        if opts.pages_limit > 0 {
            if numeric_mode && pages_processed + 1 >= opts.pages_limit {
                pages_processed += 1;
                break;
            }
            if !numeric_mode && state.page_index >= opts.pages_limit {
                break;
            }
        }

        if numeric_mode {
            pages_processed += 1;
            state.page_index += 1;
        } else {
            let Some(next_href) = pagination::next_page_href(&html, cfg) else {
                break;
            };
            let next_url = urls::absolutize(&base, &next_href);
            if !goto_and_ready(driver, cfg, &next_url).await {
                warn!("next page failed to load, ending at page {}", state.page_index);
                break;
            }
            state.page_index += 1;
        }
        throttle.wait().await;
    }

    if opts.incremental {
        let last_done = if numeric_mode {
            state.page_index.saturating_sub(1)
        } else {
            state.page_index
        };
        checkpoint::store(
            &opts.out_dir,
            &CatalogCheckpoint {
                last_page: last_done.max(1),
            },
        );
    }

    links
}

/// Start page for numeric mode: explicit index, checkpoint + 1 for
/// `latest` (1 when absent or unreadable), 1 for a bare incremental run.
fn resolve_start_page(opts: &CrawlOptions) -> u32 {
    let start = match opts.start_page {
        Some(StartPage::Index(n)) => n,
        Some(StartPage::Latest) => match checkpoint::load(&opts.out_dir) {
            Some(cp) if cp.last_page > 0 => cp.last_page + 1,
            _ => 1,
        },
        None => 1,
    };
    start.max(1)
}

/// Read the total page count from the directory root. Timeouts degrade
/// to a fixed settle sleep; an unreadable page yields 0 (unknown).
async fn detect_total_pages(driver: &mut dyn PageDriver, cfg: &SiteConfig, root_url: &str) -> u32 {
    if let Err(e) = driver.navigate(root_url, NAV_TIMEOUT_MS).await {
        warn!("loading directory root for page count: {e}");
        tokio::time::sleep(TIMEOUT_SETTLE).await;
    }
    if driver
        .wait_for_selector(&cfg.total_pages_anchor_css, READY_TIMEOUT_MS)
        .await
        .is_err()
    {
        tokio::time::sleep(TIMEOUT_SETTLE).await;
    }
    match driver.content().await {
        Ok(html) => pagination::total_pages(&html, cfg),
        Err(e) => {
            warn!("reading directory root: {e}");
            0
        }
    }
}

/// Navigate and wait for the catalog ready selector. Timeouts settle with
/// a fixed sleep and report failure; the caller decides whether that ends
/// the walk.
async fn goto_and_ready(driver: &mut dyn PageDriver, cfg: &SiteConfig, url: &str) -> bool {
    match driver.navigate(url, NAV_TIMEOUT_MS).await {
        Ok(()) => {}
        Err(DriverError::Timeout(_)) => {
            warn!("navigation timed out: {url}");
            tokio::time::sleep(TIMEOUT_SETTLE).await;
            return false;
        }
        Err(e) => {
            warn!("navigation failed: {url}: {e}");
            return false;
        }
    }
    if driver
        .wait_for_selector(&cfg.catalog_ready_css, READY_TIMEOUT_MS)
        .await
        .is_err()
    {
        warn!("catalog not ready: {url}");
        tokio::time::sleep(TIMEOUT_SETTLE).await;
        return false;
    }
    true
}

/// Product-detail anchors of one catalog page, scoped to the content
/// column, resolved absolute, in document order.
fn catalog_page_links(html: &str, base: &str, cfg: &SiteConfig) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&cfg.catalog_product_links)
        .filter_map(|a| a.attr("href"))
        .map(|href| urls::absolutize(base, href))
        .collect()
}

/// All anchors matching `pattern` anywhere in the page, resolved
/// absolute, first-seen deduplicated. Used by the brand-discovery flow.
pub fn harvest_links(html: &str, base: &str, pattern: &Regex, cfg: &SiteConfig) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for anchor in doc.select(&cfg.anchors) {
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        if !pattern.is_match(href) {
            continue;
        }
        let abs = urls::absolutize(base, href);
        if seen.insert(abs.clone()) {
            out.push(abs);
        }
    }
    out
}
