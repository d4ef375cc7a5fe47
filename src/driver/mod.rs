//! Browser driver seam.
//!
//! The crawl core only talks to [`PageDriver`]; the chromiumoxide-backed
//! implementation lives in [`chromium`]. Tests script the trait directly.

pub mod chromium;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Default navigation timeout, matching the site's worst observed latency.
pub const NAV_TIMEOUT_MS: u64 = 45_000;
/// Default selector-appearance timeout.
pub const READY_TIMEOUT_MS: u64 = 15_000;

/// Failures surfaced by the browser driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Navigation or wait exceeded its deadline. Recoverable at call sites
    /// that degrade to a fixed sleep.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Anything else the browser reported.
    #[error("driver failure: {0}")]
    Failed(String),
}

/// One cookie of the browsing context, in the shape needed to seed an
/// HTTP client with the same session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// One browser page, strictly sequential: a single in-flight navigation at
/// a time, shared by the whole crawl.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait for the document to load.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), DriverError>;

    /// Wait until `css` matches at least one element.
    async fn wait_for_selector(&mut self, css: &str, timeout_ms: u64) -> Result<(), DriverError>;

    /// Wait for the page to reach a quiescent network state.
    async fn wait_for_idle(&mut self, timeout_ms: u64) -> Result<(), DriverError>;

    /// Full rendered markup of the current page.
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Evaluate a JavaScript expression in the page, returning its JSON value.
    async fn evaluate(&mut self, js: &str) -> Result<serde_json::Value, DriverError>;

    /// URL of the current page after redirects.
    async fn current_url(&mut self) -> String;

    /// Set a cookie on the browsing context before navigation.
    async fn set_cookie(&mut self, name: &str, value: &str, domain: &str)
        -> Result<(), DriverError>;

    /// All cookies of the browsing context, for handing the verified
    /// session to plain HTTP fetches.
    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, DriverError>;

    /// Full-page screenshot written to `path`.
    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError>;

    /// Take the image-request URLs intercepted since the last drain.
    fn drain_intercepted_images(&mut self) -> Vec<String>;
}
