//! Catalog walk behavior against a scripted driver: link-follow and
//! numeric traversal, ordering, dedupe, bounds, checkpoint resume.

mod common;

use common::{catalog_page, page_url, product_url, root_url, MockDriver};
use etmoc_crawler::checkpoint::{self, CatalogCheckpoint};
use etmoc_crawler::config::{CrawlOptions, SiteConfig, StartPage};
use etmoc_crawler::walker::collect_catalog_links;
use tempfile::TempDir;

fn cfg() -> SiteConfig {
    SiteConfig::etmoc().unwrap()
}

fn opts(out: &TempDir) -> CrawlOptions {
    CrawlOptions {
        delay: 0.0,
        out_dir: out.path().to_path_buf(),
        ..CrawlOptions::default()
    }
}

fn two_page_driver() -> MockDriver {
    MockDriver::new()
        .with_page(root_url(), catalog_page(&[1, 2, 3], Some("?page=2"), None))
        .with_page(page_url(2), catalog_page(&[4, 5], None, None))
}

#[tokio::test]
async fn test_link_mode_follows_next_in_discovery_order() {
    let out = TempDir::new().unwrap();
    let mut driver = two_page_driver();

    let links = collect_catalog_links(&mut driver, &cfg(), &opts(&out)).await;

    let expected: Vec<String> = (1..=5).map(product_url).collect();
    assert_eq!(links, expected);
    assert!(driver.visited.contains(&page_url(2)));
}

#[tokio::test]
async fn test_walk_is_repeatable() {
    let out = TempDir::new().unwrap();
    let c = cfg();
    let o = opts(&out);

    let mut first = two_page_driver();
    let mut second = two_page_driver();
    let a = collect_catalog_links(&mut first, &c, &o).await;
    let b = collect_catalog_links(&mut second, &c, &o).await;

    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
}

#[tokio::test]
async fn test_links_repeated_across_pages_appear_once() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[1, 2, 3], Some("?page=2"), None))
        .with_page(page_url(2), catalog_page(&[2, 4], None, None));

    let links = collect_catalog_links(&mut driver, &cfg(), &opts(&out)).await;

    assert_eq!(
        links,
        vec![product_url(1), product_url(2), product_url(3), product_url(4)]
    );
}

#[tokio::test]
async fn test_link_limit_truncates_collection() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[1, 2, 3, 4, 5], None, None));
    let o = CrawlOptions {
        limit: 3,
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(1), product_url(2), product_url(3)]);
}

#[tokio::test]
async fn test_link_mode_stops_without_next_control() {
    let out = TempDir::new().unwrap();
    let mut driver =
        MockDriver::new().with_page(root_url(), catalog_page(&[7, 8], None, None));

    let links = collect_catalog_links(&mut driver, &cfg(), &opts(&out)).await;

    assert_eq!(links, vec![product_url(7), product_url(8)]);
}

#[tokio::test]
async fn test_numeric_mode_constructs_page_urls_up_to_total() {
    let out = TempDir::new().unwrap();
    // Root only advertises the page count; content comes from ?page=N.
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[], None, Some(2)))
        .with_page(page_url(1), catalog_page(&[1, 2], None, None))
        .with_page(page_url(2), catalog_page(&[3], None, None));
    let o = CrawlOptions {
        start_page: Some(StartPage::Index(1)),
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(1), product_url(2), product_url(3)]);
    assert!(driver.visited.contains(&page_url(1)));
    assert!(driver.visited.contains(&page_url(2)));
    assert!(!driver.visited.contains(&page_url(3)));
}

#[tokio::test]
async fn test_numeric_mode_respects_pages_limit() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[], None, None))
        .with_page(page_url(1), catalog_page(&[1, 2], None, None))
        .with_page(page_url(2), catalog_page(&[3], None, None));
    let o = CrawlOptions {
        start_page: Some(StartPage::Index(1)),
        pages_limit: 1,
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(1), product_url(2)]);
    assert!(!driver.visited.contains(&page_url(2)));
}

#[tokio::test]
async fn test_link_mode_respects_pages_limit() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[1], Some("?page=2"), None))
        .with_page(page_url(2), catalog_page(&[2], Some("?page=3"), None))
        .with_page(page_url(3), catalog_page(&[3], None, None));
    let o = CrawlOptions {
        pages_limit: 2,
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(1), product_url(2)]);
    assert!(!driver.visited.contains(&page_url(3)));
}

#[tokio::test]
async fn test_latest_resumes_one_past_checkpoint() {
    let out = TempDir::new().unwrap();
    checkpoint::store(out.path(), &CatalogCheckpoint { last_page: 5 });

    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[], None, Some(7)))
        .with_page(page_url(6), catalog_page(&[6], None, None))
        .with_page(page_url(7), catalog_page(&[7], None, None));
    let o = CrawlOptions {
        start_page: Some(StartPage::Latest),
        incremental: true,
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(6), product_url(7)]);
    assert!(!driver.visited.contains(&page_url(5)));

    // The finished walk advances the checkpoint to the last page done.
    let cp = checkpoint::load(out.path()).unwrap();
    assert_eq!(cp.last_page, 7);
}

#[tokio::test]
async fn test_latest_without_checkpoint_starts_at_one() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[], None, Some(1)))
        .with_page(page_url(1), catalog_page(&[1], None, None));
    let o = CrawlOptions {
        start_page: Some(StartPage::Latest),
        incremental: true,
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(1)]);
}

#[tokio::test]
async fn test_failed_numeric_page_ends_walk_and_checkpoints_last_done() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new()
        .with_page(root_url(), catalog_page(&[], None, None))
        .with_page(page_url(1), catalog_page(&[1], None, None))
        .failing(page_url(2));
    let o = CrawlOptions {
        start_page: Some(StartPage::Index(1)),
        incremental: true,
        ..opts(&out)
    };

    let links = collect_catalog_links(&mut driver, &cfg(), &o).await;

    assert_eq!(links, vec![product_url(1)]);
    assert_eq!(checkpoint::load(out.path()).unwrap().last_page, 1);
}

#[tokio::test]
async fn test_unreachable_root_yields_no_links() {
    let out = TempDir::new().unwrap();
    let mut driver = MockDriver::new().failing(root_url());

    let links = collect_catalog_links(&mut driver, &cfg(), &opts(&out)).await;

    assert!(links.is_empty());
}
