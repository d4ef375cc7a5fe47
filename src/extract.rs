//! Product-page field extraction.
//!
//! The markup tier ([`build_item`]) works on static HTML: title, the
//! dynamic attribute map, and the primary image. The rendered tier
//! ([`page_image_urls`], [`page_text`]) runs in-page JavaScript for the
//! best-effort image scan and the body text, and merges in image URLs
//! captured by the network interceptor.
//!
//! Attribute labels are site-controlled and open-ended; `info` is an
//! ordered string map, not a fixed schema.

use crate::config::SiteConfig;
use crate::driver::PageDriver;
use crate::text;
use crate::urls;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One extracted product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    /// Absolute canonical URL of the product page.
    pub url: String,
    /// Site-defined attribute labels to whitespace-normalized values,
    /// in document order.
    pub info: Map<String, Value>,
    /// Primary image (at most one entry), from the designated container.
    pub images: Vec<String>,
    /// Best-effort scan of every image URL on the rendered page.
    pub image_urls: Vec<String>,
    /// Rendered text of the content column, whitespace-collapsed.
    pub text_content: String,
    /// Local path of the downloaded primary image, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_local: Option<String>,
}

/// Build a record from a product page's markup. Never fails: missing
/// elements degrade to empty fields.
pub fn build_item(html: &str, page_url: &str, cfg: &SiteConfig) -> ProductRecord {
    let doc = Html::parse_document(html);
    ProductRecord {
        title: title_of(&doc, cfg),
        url: page_url.to_string(),
        info: extract_info(&doc, cfg),
        images: primary_images(&doc, page_url, cfg),
        image_urls: Vec::new(),
        text_content: String::new(),
        image_local: None,
    }
}

/// Title text: the product title element, falling back to `<title>`.
fn title_of(doc: &Html, cfg: &SiteConfig) -> String {
    if let Some(h2) = doc.select(&cfg.product_title).next() {
        return text::clean(&h2.text().collect::<String>());
    }
    doc.select(&cfg.document_title)
        .next()
        .map(|t| text::clean(&t.text().collect::<String>()))
        .unwrap_or_default()
}

/// Name keys from the title element. A nested alternate-name element
/// splits the heading into a primary and an alternate name.
fn product_names(doc: &Html, cfg: &SiteConfig) -> Vec<(String, String)> {
    let Some(h2) = doc.select(&cfg.product_title).next() else {
        return Vec::new();
    };
    if let Some(alternate) = h2.select(&cfg.title_alternate).next() {
        let alt = text::clean(&alternate.text().collect::<String>());
        let primary = text::clean(&text_excluding(h2, alternate));
        return vec![
            ("中文品名".to_string(), primary),
            ("英文品名".to_string(), alt),
        ];
    }
    let full = text::clean(&h2.text().collect::<String>());
    if full.is_empty() {
        Vec::new()
    } else {
        vec![("中文品名".to_string(), full)]
    }
}

/// Attribute map: names first, then every labeled block in the content
/// column's attribute rows, then date-value cleanup.
fn extract_info(doc: &Html, cfg: &SiteConfig) -> Map<String, Value> {
    let mut info = Map::new();
    for (key, value) in product_names(doc, cfg) {
        info.insert(key, Value::String(value));
    }

    let root = doc
        .select(&cfg.content_column)
        .next()
        .unwrap_or_else(|| doc.root_element());

    for row in root.select(&cfg.attribute_rows) {
        let children: Vec<ElementRef> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
            .collect();
        let blocks = if children.is_empty() {
            vec![row]
        } else {
            children
        };

        for block in blocks {
            // A block without a label element contributes nothing.
            let Some(label) = block.select(&cfg.row_label).next() else {
                continue;
            };
            let key = text::clean(&label.text().collect::<String>())
                .trim_matches(|c| c == '：' || c == ':')
                .to_string();
            let value = text::clean(&text_excluding(block, label));
            if !value.is_empty() {
                info.insert(key, Value::String(value));
            }
        }
    }

    for key in &cfg.date_keys {
        if let Some(Value::String(v)) = info.get(key) {
            let cleaned = clean_time_value(v, cfg);
            info.insert(key.clone(), Value::String(cleaned));
        }
    }

    info
}

/// Normalize a date-like attribute value.
///
/// In order: re-emit a year[-month[-day]] calendar pattern with single
/// spaces; else a bare 20xx year with the year suffix appended; else
/// truncate at the first boilerplate phrase that leaked in from page
/// chrome.
pub fn clean_time_value(value: &str, cfg: &SiteConfig) -> String {
    let v = text::clean(value);
    if v.is_empty() {
        return v;
    }
    if let Some(caps) = cfg.date_full.captures(&v) {
        let mut out = format!("{} 年", &caps[1]);
        if let Some(month) = caps.get(2) {
            out.push_str(&format!(" {} 月", month.as_str()));
            if let Some(day) = caps.get(3) {
                out.push_str(&format!(" {} 日", day.as_str()));
            }
        }
        return out;
    }
    if let Some(caps) = cfg.date_year.captures(&v) {
        return format!("{} 年", &caps[1]);
    }
    match cfg.boilerplate.find(&v) {
        Some(m) => text::clean(&v[..m.start()]),
        None => v,
    }
}

/// The single primary image from the designated container, absolutized.
fn primary_images(doc: &Html, page_url: &str, cfg: &SiteConfig) -> Vec<String> {
    doc.select(&cfg.primary_image)
        .next()
        .and_then(|img| img.attr("src"))
        .filter(|src| !src.is_empty())
        .map(|src| vec![urls::absolutize(page_url, src)])
        .unwrap_or_default()
}

/// Element text with one nested subtree excluded (the label element of
/// an attribute block, or the alternate-name element of the title).
fn text_excluding(el: ElementRef<'_>, excluded: ElementRef<'_>) -> String {
    let excluded_id = excluded.id();
    let mut out = String::new();
    for node in el.descendants() {
        if let Some(fragment) = node.value().as_text() {
            let inside = node.ancestors().any(|a| a.id() == excluded_id);
            if !inside {
                out.push_str(fragment);
                out.push(' ');
            }
        }
    }
    out
}

/// In-page scan for every image URL: `img` src, common lazy-load
/// attributes, the densest srcset candidate, and `background-image`
/// URLs from inline and computed styles. Absolutized and
/// fragment-stripped in the page, `data:` URIs excluded.
const IMAGE_SCAN_JS: &str = r#"
(() => {
  const urls = new Set();
  const toAbs = (u) => {
    if (!u) return null;
    try { return new URL(u, location.href).href; } catch { return null; }
  };
  const add = (u) => {
    const h = toAbs(u);
    if (!h) return;
    if (h.startsWith('data:')) return;
    urls.add(h.split('#')[0]);
  };
  for (const img of document.querySelectorAll('img')) {
    add(img.getAttribute('src'));
    for (const k of ['data-src', 'data-original', 'data-lazy', 'data-url']) {
      const v = img.getAttribute(k);
      if (v) add(v);
    }
    const srcset = img.getAttribute('srcset') || img.getAttribute('data-srcset');
    if (srcset) {
      const candidates = srcset.split(',').map(s => s.trim()).filter(Boolean).map(part => {
        const m = part.split(/\s+/);
        return { url: m[0], d: m[1] || '' };
      });
      if (candidates.length) {
        const score = (c) => {
          const mm = (c.d || '').match(/(\d+(?:\.\d+)?)(x|w)/i);
          return mm ? parseFloat(mm[1]) : 0;
        };
        let best = candidates[0];
        for (const c of candidates) {
          if (score(c) > score(best)) best = c;
        }
        add(best.url);
      }
    }
  }
  const styleUrlRegex = /url\((['"]?)(.*?)\1\)/gi;
  const bgUrls = (s) => {
    const arr = [];
    if (!s) return arr;
    let m;
    while ((m = styleUrlRegex.exec(s))) {
      const u = m[2];
      if (!u || u.startsWith('data:')) continue;
      arr.push(u);
    }
    return arr;
  };
  for (const el of document.querySelectorAll('*')) {
    bgUrls(el.getAttribute('style') || '').forEach(add);
    try {
      const bg = window.getComputedStyle(el).backgroundImage;
      if (bg && bg !== 'none') bgUrls(bg).forEach(add);
    } catch {}
  }
  return Array.from(urls);
})()
"#;

/// Scan the rendered page for image URLs and merge in the image requests
/// intercepted while this page loaded. Best-effort: evaluation failure
/// yields whatever the interceptor saw.
pub async fn page_image_urls(
    driver: &mut dyn PageDriver,
    fresh_intercepts: Vec<String>,
) -> Vec<String> {
    let mut candidates: Vec<String> = match driver.evaluate(IMAGE_SCAN_JS).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    candidates.extend(fresh_intercepts);
    let base = driver.current_url().await;
    merge_image_urls(&base, candidates)
}

/// Absolutize, strip fragments, drop `data:` URIs, dedupe first-seen.
pub fn merge_image_urls(base: &str, candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for url in candidates {
        if url.is_empty() || url.starts_with("data:") {
            continue;
        }
        let abs = urls::strip_fragment(&urls::absolutize(base, &url));
        if abs.starts_with("data:") {
            continue;
        }
        if seen.insert(abs.clone()) {
            out.push(abs);
        }
    }
    out
}

/// Rendered text of the content column (body when absent), collapsed to
/// single spaces. Evaluation failure degrades to an empty string.
pub async fn page_text(driver: &mut dyn PageDriver, cfg: &SiteConfig) -> String {
    let js = format!(
        "(() => ((document.querySelector('{}') || document.body).innerText || ''))()",
        cfg.content_column_css
    );
    match driver.evaluate(&js).await {
        Ok(value) => text::clean(value.as_str().unwrap_or("")),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SiteConfig {
        SiteConfig::etmoc().unwrap()
    }

    fn product_page(body: &str) -> String {
        format!(
            "<html><head><title>fallback title</title></head><body>\
             <div class=\"container\"><div class=\"row\"><div class=\"col-8\">{body}</div>\
             </div></div></body></html>"
        )
    }

    const URL: &str = "http://www.etmoc.com/Firms/Product?Id=3595";

    #[test]
    fn test_title_with_alternate_name_splits() {
        let html = product_page(
            r#"<div class="brand-title"><h2>中华（全开式） <small>Chunghwa</small></h2></div>"#,
        );
        let item = build_item(&html, URL, &cfg());
        assert_eq!(item.title, "中华（全开式） Chunghwa");
        assert_eq!(
            item.info.get("中文品名").unwrap().as_str().unwrap(),
            "中华（全开式）"
        );
        assert_eq!(
            item.info.get("英文品名").unwrap().as_str().unwrap(),
            "Chunghwa"
        );
    }

    #[test]
    fn test_title_without_alternate() {
        let html =
            product_page(r#"<div class="brand-title"><h2>红塔山</h2></div>"#);
        let item = build_item(&html, URL, &cfg());
        assert_eq!(item.title, "红塔山");
        assert_eq!(item.info.get("中文品名").unwrap().as_str().unwrap(), "红塔山");
        assert!(item.info.get("英文品名").is_none());
    }

    #[test]
    fn test_missing_title_falls_back_to_document_title() {
        let html = product_page("<p>nothing</p>");
        let item = build_item(&html, URL, &cfg());
        assert_eq!(item.title, "fallback title");
        assert!(item.info.get("中文品名").is_none());
    }

    #[test]
    fn test_attribute_rows_with_sub_blocks() {
        let html = product_page(
            r#"<div class="proBars">
                 <div class="proBar">
                   <div><span>焦油量：</span>10mg</div>
                   <div><span>烟碱量</span>0.9mg</div>
                 </div>
                 <div class="proBar"><span>包装形式：</span>软盒</div>
                 <div class="proBar"><b>no label here</b></div>
               </div>"#,
        );
        let item = build_item(&html, URL, &cfg());
        assert_eq!(item.info.get("焦油量").unwrap().as_str().unwrap(), "10mg");
        assert_eq!(item.info.get("烟碱量").unwrap().as_str().unwrap(), "0.9mg");
        assert_eq!(item.info.get("包装形式").unwrap().as_str().unwrap(), "软盒");
        // Unlabeled block skipped, names absent: exactly three keys.
        assert_eq!(item.info.len(), 3);
    }

    #[test]
    fn test_attribute_rows_outside_content_column_ignored() {
        let html = "<html><body><div class=\"container\"><div class=\"row\">\
             <div class=\"col-8\"><p>empty</p></div></div></div>\
             <div class=\"proBars\"><div class=\"proBar\"><span>焦油量</span>8mg</div></div>\
             </body></html>";
        let item = build_item(html, URL, &cfg());
        assert!(item.info.get("焦油量").is_none());
    }

    #[test]
    fn test_date_full_pattern_normalized() {
        let c = cfg();
        assert_eq!(
            clean_time_value("2020年5月1日 在线评分给这款烟打分", &c),
            "2020 年 5 月 1 日"
        );
        assert_eq!(clean_time_value("2021 年 11 月", &c), "2021 年 11 月");
        assert_eq!(clean_time_value("2018年", &c), "2018 年");
    }

    #[test]
    fn test_date_bare_year_gets_suffix() {
        assert_eq!(clean_time_value("2019", &cfg()), "2019 年");
        assert_eq!(clean_time_value("约2015前后", &cfg()), "2015 年");
    }

    #[test]
    fn test_date_boilerplate_truncation() {
        let c = cfg();
        assert_eq!(clean_time_value("中支 同品牌产品推荐", &c), "中支");
        assert_eq!(clean_time_value("未知 版权所有", &c), "未知");
        assert_eq!(clean_time_value("细支", &c), "细支");
    }

    #[test]
    fn test_date_cleanup_applied_to_launch_date_keys() {
        let html = product_page(
            r#"<div class="proBars">
                 <div class="proBar"><span>上市时间：</span>2020年5月1日 在线评分</div>
                 <div class="proBar"><span>烟支规格</span>84mm 同品牌产品</div>
               </div>"#,
        );
        let item = build_item(&html, URL, &cfg());
        assert_eq!(
            item.info.get("上市时间").unwrap().as_str().unwrap(),
            "2020 年 5 月 1 日"
        );
        // Only date-like keys are cleaned.
        assert_eq!(
            item.info.get("烟支规格").unwrap().as_str().unwrap(),
            "84mm 同品牌产品"
        );
    }

    #[test]
    fn test_primary_image_absolutized() {
        let html = product_page(
            r#"<div class="proImg"><img src="/upload/pro/3595.jpg"></div>"#,
        );
        let item = build_item(&html, URL, &cfg());
        assert_eq!(
            item.images,
            vec!["http://www.etmoc.com/upload/pro/3595.jpg".to_string()]
        );
    }

    #[test]
    fn test_missing_image_container_yields_empty() {
        let html = product_page("<p>no image</p>");
        let item = build_item(&html, URL, &cfg());
        assert!(item.images.is_empty());
        assert!(item.image_urls.is_empty());
    }

    #[test]
    fn test_merge_image_urls_dedupes_and_filters() {
        let merged = merge_image_urls(
            "http://www.etmoc.com/Firms/Product?Id=1",
            vec![
                "/upload/a.jpg#frag".to_string(),
                "http://www.etmoc.com/upload/a.jpg".to_string(),
                "data:image/png;base64,xyz".to_string(),
                "".to_string(),
                "http://cdn.example.com/b.png".to_string(),
            ],
        );
        assert_eq!(
            merged,
            vec![
                "http://www.etmoc.com/upload/a.jpg".to_string(),
                "http://cdn.example.com/b.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_info_preserves_document_order() {
        let html = product_page(
            r#"<div class="proBars">
                 <div class="proBar"><span>类型</span>烤烟型</div>
                 <div class="proBar"><span>焦油量</span>10mg</div>
               </div>"#,
        );
        let item = build_item(&html, URL, &cfg());
        let keys: Vec<&str> = item.info.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["类型", "焦油量"]);
    }
}
