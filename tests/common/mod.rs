//! Scripted page driver and markup fixtures shared by integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use etmoc_crawler::driver::{BrowserCookie, DriverError, PageDriver};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const ORIGIN: &str = "http://www.etmoc.com";

/// Verification URL the bootstrapper hits when the fingerprint script
/// cannot run (the mock returns no value, so the fixed fallback is used).
pub fn verify_url() -> String {
    format!(
        "{ORIGIN}/Firms/BrandAll?security_verify_data={}",
        etmoc_crawler::session::hex_str("1280,900")
    )
}

pub fn root_url() -> String {
    format!("{ORIGIN}/Firms/Brands")
}

pub fn page_url(index: u32) -> String {
    format!("{ORIGIN}/Firms/Brands?page={index}")
}

pub fn product_url(id: u32) -> String {
    format!("{ORIGIN}/Firms/Product?Id={id}")
}

/// In-memory driver: canned markup per URL, scripted failures, a log of
/// every navigation.
#[derive(Default)]
pub struct MockDriver {
    pages: HashMap<String, String>,
    fail_urls: HashSet<String>,
    intercept_on_navigate: HashMap<String, Vec<String>>,
    intercepted: Vec<String>,
    current: String,
    pub visited: Vec<String>,
    pub cookies: Vec<(String, String, String)>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// A verification page carrying one product link, enough to pass the
    /// bootstrap check.
    pub fn with_verified_session(self) -> Self {
        self.with_page(
            verify_url(),
            r#"<html><body><a href="/Firms/BrandShow?Id=1">brand</a></body></html>"#,
        )
    }

    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.fail_urls.insert(url.into());
        self
    }

    /// Image request URLs "seen by the interceptor" while `url` loads.
    pub fn with_intercepts(mut self, url: impl Into<String>, images: &[&str]) -> Self {
        self.intercept_on_navigate
            .insert(url.into(), images.iter().map(|s| s.to_string()).collect());
        self
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<(), DriverError> {
        self.visited.push(url.to_string());
        if self.fail_urls.contains(url) {
            return Err(DriverError::Failed(format!("scripted failure: {url}")));
        }
        self.current = url.to_string();
        if let Some(images) = self.intercept_on_navigate.get(url) {
            self.intercepted.extend(images.iter().cloned());
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, _css: &str, _timeout_ms: u64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for_idle(&mut self, _timeout_ms: u64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        Ok(self
            .pages
            .get(&self.current)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn evaluate(&mut self, _js: &str) -> Result<Value, DriverError> {
        // No scripting in the mock: the bootstrap falls back to its fixed
        // fingerprint, image/text scans degrade to empty.
        Ok(Value::Null)
    }

    async fn current_url(&mut self) -> String {
        self.current.clone()
    }

    async fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        domain: &str,
    ) -> Result<(), DriverError> {
        self.cookies
            .push((name.to_string(), value.to_string(), domain.to_string()));
        Ok(())
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, DriverError> {
        Ok(self
            .cookies
            .iter()
            .map(|(name, value, domain)| BrowserCookie {
                name: name.clone(),
                value: value.clone(),
                domain: domain.clone(),
                path: "/".to_string(),
            })
            .collect())
    }

    async fn screenshot(&mut self, _path: &Path) -> Result<(), DriverError> {
        Ok(())
    }

    fn drain_intercepted_images(&mut self) -> Vec<String> {
        std::mem::take(&mut self.intercepted)
    }
}

/// A directory page: product anchors in the content column, an optional
/// "next" anchor, and an optional pagination nav advertising the total
/// page count.
pub fn catalog_page(product_ids: &[u32], next_href: Option<&str>, total_pages: Option<u32>) -> String {
    let mut column = String::from("<ul>");
    for id in product_ids {
        column.push_str(&format!(
            "<li><a href=\"/Firms/Product?Id={id}\">product {id}</a></li>"
        ));
    }
    column.push_str("</ul>");
    if let Some(href) = next_href {
        column.push_str(&format!(
            "<div class=\"pagination\"><a class=\"next\" href=\"{href}\">下一页</a></div>"
        ));
    }

    let nav = match total_pages {
        Some(total) => format!(
            "<nav><ul><li><a href=\"?page={total}\">{total}</a></li></ul></nav>"
        ),
        None => String::new(),
    };

    format!(
        "<html><body><div class=\"container\"><div class=\"row\">\
         <div class=\"col-8\">{column}</div></div>{nav}</div></body></html>"
    )
}

/// A product detail page with a title, attribute rows, and an optional
/// primary image.
pub fn product_page(name: &str, attributes: &[(&str, &str)], image: Option<&str>) -> String {
    let mut column = format!("<div class=\"brand-title\"><h2>{name}</h2></div>");
    if let Some(src) = image {
        column.push_str(&format!("<div class=\"proImg\"><img src=\"{src}\"></div>"));
    }
    column.push_str("<div class=\"proBars\">");
    for (label, value) in attributes {
        column.push_str(&format!(
            "<div class=\"proBar\"><span>{label}：</span>{value}</div>"
        ));
    }
    column.push_str("</div>");
    format!(
        "<html><head><title>{name}</title></head><body>\
         <div class=\"container\"><div class=\"row\"><div class=\"col-8\">{column}</div>\
         </div></div></body></html>"
    )
}
