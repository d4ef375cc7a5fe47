//! `etmoc` — crawl the ETMOC tobacco product catalog.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use etmoc_crawler::config::{CrawlOptions, SiteConfig, StartPage};
use etmoc_crawler::driver::chromium::ChromiumDriver;
use etmoc_crawler::orchestrator;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Paginated product directory.
    Catalog,
    /// Brand listing pages reached from the verification endpoint.
    Brands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Collect product links only.
    List,
    /// Extract full product records.
    Detail,
    /// Dump one product page's raw markup and screenshot (needs --id).
    Dump,
}

/// Crawl the ETMOC product catalog behind its verification challenge.
#[derive(Debug, Parser)]
#[command(name = "etmoc", version, about)]
struct Cli {
    /// Maximum products to collect; 0 = unbounded.
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Seconds between page fetches.
    #[arg(long, default_value_t = 0.7)]
    delay: f64,

    /// Output directory.
    #[arg(long, default_value = "etmoc_output")]
    out: PathBuf,

    /// Maximum catalog pages, or "all"; defaults to 1 page.
    #[arg(long)]
    pages: Option<String>,

    /// Start page: an integer, or "latest" to resume from the checkpoint.
    #[arg(long)]
    start_page: Option<StartPage>,

    /// Incremental run: keep the output directory, write a checkpoint.
    #[arg(long)]
    incremental: bool,

    /// Where to discover products.
    #[arg(long, value_enum, default_value_t = Source::Catalog)]
    source: Source,

    /// What to do with the catalog source.
    #[arg(long, value_enum, default_value_t = Action::Detail)]
    action: Action,

    /// Product id for the dump action.
    #[arg(long)]
    id: Option<u32>,

    /// Abort image/media/font/stylesheet requests to speed up fetches
    /// (the default).
    #[arg(long, overrides_with = "no_block_resources")]
    block_resources: bool,

    /// Let all resources load (comparison runs).
    #[arg(long, overrides_with = "block_resources")]
    no_block_resources: bool,

    /// Download each record's primary image into out/images.
    #[arg(long, overrides_with = "no_download_images")]
    download_images: bool,

    /// Keep image URLs only, download nothing (the default).
    #[arg(long, overrides_with = "download_images")]
    no_download_images: bool,
}

impl Cli {
    /// `--pages` defaults to 1; "all" lifts the bound; anything
    /// unparseable warns and falls back to 1.
    fn pages_limit(&self) -> u32 {
        match self.pages.as_deref() {
            None => 1,
            Some(raw) => {
                let normalized = raw.trim().to_ascii_lowercase();
                if normalized == "all" {
                    0
                } else {
                    normalized.parse().unwrap_or_else(|_| {
                        warn!("--pages expects an integer or 'all', got {raw:?}; using 1");
                        1
                    })
                }
            }
        }
    }

    fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            limit: self.limit,
            delay: self.delay,
            out_dir: self.out.clone(),
            pages_limit: self.pages_limit(),
            start_page: self.start_page,
            incremental: self.incremental,
            block_resources: !self.no_block_resources,
            download_images: self.download_images,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = SiteConfig::etmoc()?;
    let opts = cli.crawl_options();

    let mut driver = ChromiumDriver::launch(opts.block_resources).await?;
    let outcome = match (cli.source, cli.action) {
        (_, Action::Dump) => match cli.id {
            Some(id) => orchestrator::dump_product(&mut driver, &cfg, &opts, id).await,
            None => Err(anyhow::anyhow!("--action dump requires --id <product id>")),
        },
        (Source::Brands, _) => orchestrator::crawl_brands(&mut driver, &cfg, &opts).await,
        (Source::Catalog, Action::List) => {
            orchestrator::crawl_links(&mut driver, &cfg, &opts).await
        }
        (Source::Catalog, Action::Detail) => {
            orchestrator::crawl_catalog(&mut driver, &cfg, &opts).await
        }
    };
    driver.close().await;
    outcome
}
