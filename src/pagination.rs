//! Pagination detection on catalog directory pages.
//!
//! Two independent questions: "where is the next page?" (structural
//! selectors first, free-text glyph scan last) and "how many pages are
//! there in total?" (designated anchor, falling back to the maximum
//! numeric token across the pagination nav).

use crate::config::SiteConfig;
use crate::text;
use scraper::{ElementRef, Html};

/// Pick the next-page href from a catalog page, or `None` at end of catalog.
///
/// Tie-break order, first match wins:
/// 1. structural pagination candidates (`a[rel=next]`, `.next` anchors);
/// 2. last anchor of a `.pagination` container, unless it is a
///    `javascript:` pseudo-URL;
/// 3. anchors inside the content column whose text matches the next-page
///    glyphs (下一页 / 下页 / › / »).
pub fn next_page_href(html: &str, cfg: &SiteConfig) -> Option<String> {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&cfg.content_column)
        .next()
        .unwrap_or_else(|| doc.root_element());

    for candidate in &cfg.pagination_candidates {
        if let Some(href) = root.select(candidate).next().and_then(|a| a.attr("href")) {
            return Some(href.to_string());
        }
    }

    if let Some(href) = root
        .select(&cfg.pagination_last_anchor)
        .next()
        .and_then(|a| a.attr("href"))
    {
        if !href.to_ascii_lowercase().contains("javascript:") {
            return Some(href.to_string());
        }
    }

    for anchor in root.select(&cfg.anchors) {
        let label = text::clean(&anchor.text().collect::<String>());
        if cfg.next_text.is_match(&label) {
            if let Some(href) = anchor.attr("href") {
                return Some(href.to_string());
            }
        }
    }

    None
}

/// Read the total page count from a directory page.
///
/// Prefers the designated pagination anchor's digit text, then its `page=`
/// href parameter; otherwise scans every navigation link and takes the
/// maximum page number found. Returns 0 when nothing is found, which
/// callers must treat as "unknown upper bound", not "zero pages".
pub fn total_pages(html: &str, cfg: &SiteConfig) -> u32 {
    let doc = Html::parse_document(html);

    if let Some(anchor) = doc.select(&cfg.total_pages_anchor).next() {
        if let Some(n) = page_number_of(anchor, cfg) {
            return n;
        }
    }

    let mut last = 0;
    for anchor in doc.select(&cfg.nav_links) {
        let label = text::clean(&anchor.text().collect::<String>());
        if let Some(m) = cfg.digits.find(&label) {
            if let Ok(n) = m.as_str().parse::<u32>() {
                last = last.max(n);
            }
        }
        if let Some(n) = href_page_param(anchor.attr("href"), cfg) {
            last = last.max(n);
        }
    }
    last
}

fn page_number_of(anchor: ElementRef<'_>, cfg: &SiteConfig) -> Option<u32> {
    let label = text::clean(&anchor.text().collect::<String>());
    if let Some(m) = cfg.digits.find(&label) {
        if let Ok(n) = m.as_str().parse::<u32>() {
            return Some(n);
        }
    }
    href_page_param(anchor.attr("href"), cfg)
}

fn href_page_param(href: Option<&str>, cfg: &SiteConfig) -> Option<u32> {
    let captures = cfg.page_param.captures(href?)?;
    captures.get(1)?.as_str().parse().ok()
}
