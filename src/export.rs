//! Output artifacts: JSON/CSV product dumps, link lists, image downloads.

use crate::config::USER_AGENT;
use crate::driver::BrowserCookie;
use crate::extract::ProductRecord;
use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Serialize any value as pretty-printed UTF-8 JSON.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write records as CSV: `title`, `url`, then the sorted union of every
/// attribute key across all records; missing values stay empty.
pub fn save_csv(records: &[ProductRecord], path: &Path) -> Result<()> {
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        keys.extend(record.info.keys().map(|k| k.as_str()));
    }

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["title", "url"];
    header.extend(keys.iter().copied());
    writer.write_record(&header).context("writing csv header")?;

    for record in records {
        let mut row = vec![record.title.clone(), record.url.clone()];
        for key in &keys {
            let value = record
                .info
                .get(*key)
                .and_then(|v| v.as_str())
                .unwrap_or("");
            row.push(value.to_string());
        }
        writer.write_record(&row).context("writing csv row")?;
    }
    writer.flush().context("flushing csv")?;
    Ok(())
}

/// Link-list artifact: `{count, links}`.
#[derive(Debug, Serialize)]
pub struct LinkList<'a> {
    pub count: usize,
    pub links: &'a [String],
}

/// Write `product_links.json` under `out_dir`.
pub fn save_links(links: &[String], out_dir: &Path) -> Result<()> {
    save_json(
        &LinkList {
            count: links.len(),
            links,
        },
        &out_dir.join("product_links.json"),
    )
}

/// Prepare the output directory. Non-incremental runs wipe its contents;
/// an `images/` subdirectory is created when downloads are requested.
pub fn ensure_clean_out(out_dir: &Path, create_images_dir: bool) -> Result<()> {
    if out_dir.is_dir() {
        for entry in std::fs::read_dir(out_dir)
            .with_context(|| format!("listing {}", out_dir.display()))?
        {
            let path = entry?.path();
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = removed {
                warn!("could not clear {}: {e}", path.display());
            }
        }
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    if create_images_dir {
        std::fs::create_dir_all(out_dir.join("images")).context("creating images dir")?;
    }
    Ok(())
}

/// File name derived from an image URL's last path segment, restricted to
/// a filesystem-safe alphabet.
pub fn image_file_name(url: &str) -> String {
    let segment = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.last().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image.jpg".to_string());
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Cookie jar seeded from the browser context. The image host sits
/// behind the same `srcurl` verification gate as the catalog pages, so a
/// cookie-less request would be served the challenge page instead of
/// image bytes.
fn session_cookie_jar(cookies: &[BrowserCookie]) -> Jar {
    let jar = Jar::default();
    for cookie in cookies {
        let domain = cookie.domain.trim_start_matches('.');
        let Ok(origin) = format!("http://{domain}/").parse::<url::Url>() else {
            warn!("cookie {} has an unusable domain {:?}", cookie.name, cookie.domain);
            continue;
        };
        let path = if cookie.path.is_empty() {
            "/"
        } else {
            cookie.path.as_str()
        };
        jar.add_cookie_str(
            &format!(
                "{}={}; Domain={domain}; Path={path}",
                cookie.name, cookie.value
            ),
            &origin,
        );
    }
    jar
}

/// Best-effort download of each record's first image into `out/images/`,
/// deferred until after extraction so slow image hosts never block the
/// crawl. The verified session's cookies ride along; failures are logged
/// and skipped.
pub async fn download_images_for_items(
    records: &mut [ProductRecord],
    out_dir: &Path,
    cookies: &[BrowserCookie],
) {
    let images_dir = out_dir.join("images");
    if let Err(e) = std::fs::create_dir_all(&images_dir) {
        warn!("creating images dir: {e}");
        return;
    }
    let client = match reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .cookie_provider(Arc::new(session_cookie_jar(cookies)))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("building image download client: {e}");
            return;
        }
    };

    let mut downloaded = 0usize;
    for record in records.iter_mut() {
        let url = record
            .image_urls
            .first()
            .or_else(|| record.images.first())
            .cloned();
        let Some(url) = url else {
            continue;
        };
        match download_image(&client, &url, &images_dir).await {
            Ok(path) => {
                record.image_local = Some(path.display().to_string());
                downloaded += 1;
            }
            Err(e) => warn!("image download failed for {url}: {e}"),
        }
    }
    info!("downloaded {downloaded} images to {}", images_dir.display());
}

async fn download_image(
    client: &reqwest::Client,
    url: &str,
    images_dir: &Path,
) -> Result<PathBuf> {
    let path = images_dir.join(image_file_name(url));
    if path.exists() {
        return Ok(path);
    }
    let response = client.get(url).send().await.context("requesting image")?;
    if !response.status().is_success() {
        anyhow::bail!("status {}", response.status());
    }
    let bytes = response.bytes().await.context("reading image bytes")?;
    std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
