//! End-to-end crawl flows.
//!
//! One verified session, one page, strictly sequential. A failed product
//! page is logged and skipped; only a failed session bootstrap aborts the
//! run. Image byte downloads are deferred until after extraction so slow
//! image hosts never stall the crawl loop.

use crate::config::{CrawlOptions, SiteConfig};
use crate::driver::{BrowserCookie, DriverError, PageDriver, NAV_TIMEOUT_MS, READY_TIMEOUT_MS};
use crate::export;
use crate::extract::{self, ProductRecord};
use crate::session;
use crate::throttle::Throttle;
use crate::walker;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{info, warn};

/// Fixed settle delay after a product-page timeout.
const TIMEOUT_SETTLE: Duration = Duration::from_millis(800);

/// Catalog source, detail action: walk the directory, extract every
/// discovered product, write `products_catalog.json` / `.csv`.
pub async fn crawl_catalog(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    opts: &CrawlOptions,
) -> Result<()> {
    prepare_out(opts, opts.download_images)?;
    session::bootstrap(driver, cfg).await?;

    let links = walker::collect_catalog_links(driver, cfg, opts).await;
    info!("catalog walk collected {} product links", links.len());

    let mut products = extract_all(driver, cfg, opts, &links).await;

    if opts.download_images {
        let cookies = session_cookies(driver).await;
        export::download_images_for_items(&mut products, &opts.out_dir, &cookies).await;
    }

    export::save_json(&products, &opts.out_dir.join("products_catalog.json"))?;
    export::save_csv(&products, &opts.out_dir.join("products_catalog.csv"))?;
    info!(
        "catalog crawl done: {} records in {}",
        products.len(),
        opts.out_dir.display()
    );
    Ok(())
}

/// Catalog source, list action: collect links only, write
/// `product_links.json`.
pub async fn crawl_links(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    opts: &CrawlOptions,
) -> Result<()> {
    prepare_out(opts, false)?;
    session::bootstrap(driver, cfg).await?;

    let links = walker::collect_catalog_links(driver, cfg, opts).await;
    export::save_links(&links, &opts.out_dir)?;
    info!(
        "link collection done: {} links in {}",
        links.len(),
        opts.out_dir.display()
    );
    Ok(())
}

/// Brands source: discover product links through the brand listing pages
/// reached from the verification endpoint, then extract each product.
/// Writes `products_playwright.json` / `.csv` plus debug snapshots of the
/// rendered brand page.
pub async fn crawl_brands(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    opts: &CrawlOptions,
) -> Result<()> {
    prepare_out(opts, opts.download_images)?;
    let brand_html = session::bootstrap(driver, cfg).await?;

    // Raw snapshots for diagnosing template drift.
    if let Err(e) = std::fs::write(opts.out_dir.join("brand_all.html"), &brand_html) {
        warn!("writing brand page snapshot: {e}");
    }
    if let Err(e) = driver.screenshot(&opts.out_dir.join("brand_all.png")).await {
        warn!("saving brand page screenshot: {e}");
    }

    let base = driver.current_url().await;
    let mut entry_links = walker::harvest_links(&brand_html, &base, &cfg.brand_link, cfg);
    entry_links.extend(walker::harvest_links(&brand_html, &base, &cfg.product_link, cfg));

    let throttle = Throttle::new(opts.delay);
    let mut product_urls: Vec<String> = Vec::new();
    for link in &entry_links {
        if cfg.product_link.is_match(link) {
            if !product_urls.contains(link) {
                product_urls.push(link.clone());
            }
            continue;
        }
        throttle.wait().await;
        if let Err(e) = driver.navigate(link, NAV_TIMEOUT_MS).await {
            warn!("brand page failed, skipping: {link}: {e}");
            continue;
        }
        let html = match driver.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("reading brand page {link}: {e}");
                continue;
            }
        };
        let page_url = driver.current_url().await;
        for product in walker::harvest_links(&html, &page_url, &cfg.product_link, cfg) {
            if !product_urls.contains(&product) {
                product_urls.push(product);
            }
        }
        if opts.limit > 0 && product_urls.len() >= opts.limit {
            break;
        }
    }
    if opts.limit > 0 {
        product_urls.truncate(opts.limit);
    }
    info!("brand discovery found {} product links", product_urls.len());

    let mut products = extract_all(driver, cfg, opts, &product_urls).await;

    if opts.download_images {
        let cookies = session_cookies(driver).await;
        export::download_images_for_items(&mut products, &opts.out_dir, &cookies).await;
    }

    export::save_json(&products, &opts.out_dir.join("products_playwright.json"))?;
    export::save_csv(&products, &opts.out_dir.join("products_playwright.csv"))?;
    info!(
        "brand crawl done: {} records in {}",
        products.len(),
        opts.out_dir.display()
    );
    Ok(())
}

/// Dump action: bootstrap, load one product page, and write its raw
/// markup and a full-page screenshot for inspecting extraction problems
/// against the exact rendered page.
pub async fn dump_product(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    opts: &CrawlOptions,
    product_id: u32,
) -> Result<()> {
    std::fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("creating {}", opts.out_dir.display()))?;
    session::bootstrap(driver, cfg).await?;

    let url = cfg.product_url(product_id);
    match driver.navigate(&url, NAV_TIMEOUT_MS).await {
        Ok(()) => {}
        Err(DriverError::Timeout(_)) => {
            tokio::time::sleep(TIMEOUT_SETTLE).await;
        }
        Err(e) => return Err(e).context("navigating to product page"),
    }
    if driver
        .wait_for_selector(&cfg.product_ready_css, READY_TIMEOUT_MS)
        .await
        .is_err()
    {
        tokio::time::sleep(TIMEOUT_SETTLE).await;
    }

    let html = driver.content().await.context("reading product page")?;
    let html_path = opts.out_dir.join(format!("debug_product_{product_id}.html"));
    std::fs::write(&html_path, &html)
        .with_context(|| format!("writing {}", html_path.display()))?;

    let png_path = opts.out_dir.join(format!("debug_product_{product_id}.png"));
    if let Err(e) = driver.screenshot(&png_path).await {
        warn!("saving product screenshot: {e}");
    }
    info!(
        "dumped product {product_id} to {} / {}",
        html_path.display(),
        png_path.display()
    );
    Ok(())
}

/// Browser-context cookies for the download client. An unreadable
/// context degrades to cookie-less downloads rather than failing the run.
async fn session_cookies(driver: &mut dyn PageDriver) -> Vec<BrowserCookie> {
    match driver.cookies().await {
        Ok(cookies) => cookies,
        Err(e) => {
            warn!("reading session cookies for downloads: {e}");
            Vec::new()
        }
    }
}

/// Extract every link in order, skipping failures. One bad page never
/// aborts the crawl.
async fn extract_all(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    opts: &CrawlOptions,
    links: &[String],
) -> Vec<ProductRecord> {
    let throttle = Throttle::new(opts.delay);
    let bar = ProgressBar::new(links.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{prefix} [{bar:28}] {pos}/{len} ETA {eta}")
    {
        bar.set_style(style.progress_chars("#-"));
    }
    bar.set_prefix("details");

    let mut products = Vec::new();
    for (i, link) in links.iter().enumerate() {
        throttle.wait().await;
        match extract_product(driver, cfg, link).await {
            Ok(item) => {
                bar.println(format!("[{}/{}] {}", i + 1, links.len(), item.title));
                products.push(item);
            }
            Err(e) => warn!("extraction failed, skipping {link}: {e}"),
        }
        bar.inc(1);
    }
    bar.finish();
    products
}

/// Navigate to one product page and build its record. Timeouts settle
/// with a fixed sleep and extraction proceeds with whatever rendered;
/// hard navigation failures surface to the caller for skipping.
async fn extract_product(
    driver: &mut dyn PageDriver,
    cfg: &SiteConfig,
    url: &str,
) -> Result<ProductRecord> {
    // Reset the interception log so the scan only sees this page's images.
    let _ = driver.drain_intercepted_images();

    match driver.navigate(url, NAV_TIMEOUT_MS).await {
        Ok(()) => {}
        Err(DriverError::Timeout(_)) => {
            tokio::time::sleep(TIMEOUT_SETTLE).await;
        }
        Err(e) => return Err(e).context("navigating to product page"),
    }
    if driver
        .wait_for_selector(&cfg.product_ready_css, READY_TIMEOUT_MS)
        .await
        .is_err()
    {
        tokio::time::sleep(TIMEOUT_SETTLE).await;
    }

    let html = driver.content().await.context("reading product page")?;
    let mut item = extract::build_item(&html, url, cfg);

    let fresh_intercepts = driver.drain_intercepted_images();
    item.image_urls = extract::page_image_urls(driver, fresh_intercepts).await;
    item.text_content = extract::page_text(driver, cfg).await;
    if item.images.is_empty() {
        if let Some(first) = item.image_urls.first() {
            item.images = vec![first.clone()];
        }
    }
    Ok(item)
}

/// Output directory hygiene: incremental runs keep previous artifacts,
/// anything else starts from a clean directory.
fn prepare_out(opts: &CrawlOptions, with_images: bool) -> Result<()> {
    if opts.incremental {
        std::fs::create_dir_all(&opts.out_dir)
            .with_context(|| format!("creating {}", opts.out_dir.display()))?;
        if with_images {
            std::fs::create_dir_all(opts.out_dir.join("images"))
                .context("creating images dir")?;
        }
        Ok(())
    } else {
        export::ensure_clean_out(&opts.out_dir, with_images)
    }
}
