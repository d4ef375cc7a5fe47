//! Chromium (CDP) implementation of the page driver.
//!
//! One headless browser, one page, reused for the whole run. Resource
//! blocking is a per-context routing policy installed at launch: heavy
//! resource types are aborted at the network layer and aborted image
//! requests are recorded so the extractor can still report their URLs.

use crate::config::USER_AGENT;
use crate::driver::{BrowserCookie, DriverError, PageDriver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// How often selector waits re-poll the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser-backed [`PageDriver`].
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    intercepted_images: Arc<Mutex<Vec<String>>>,
}

impl ChromiumDriver {
    /// Launch a headless browser and open the single crawl page.
    pub async fn launch(block_resources: bool) -> Result<Self> {
        let config = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .build()
            .map_err(|e| anyhow::anyhow!("building browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launching headless browser")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("opening crawl page")?;
        page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await
            .context("setting user agent")?;

        let intercepted_images = Arc::new(Mutex::new(Vec::new()));
        if block_resources {
            install_resource_blocking(&page, Arc::clone(&intercepted_images)).await?;
        }

        Ok(Self {
            browser,
            page,
            intercepted_images,
        })
    }

    /// Shut the browser down.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser close: {e}");
        }
        let _ = self.browser.wait().await;
    }
}

/// Pause every request and abort heavy resource types. Safe as a global
/// route handler: the crawl has a single in-flight navigation at a time.
async fn install_resource_blocking(
    page: &Page,
    intercepted_images: Arc<Mutex<Vec<String>>>,
) -> Result<()> {
    page.execute(FetchEnableParams::default())
        .await
        .context("enabling request interception")?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .context("listening for paused requests")?;
    let page = page.clone();

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let blocked = matches!(
                event.resource_type,
                ResourceType::Image
                    | ResourceType::Media
                    | ResourceType::Font
                    | ResourceType::Stylesheet
            );
            if blocked {
                if event.resource_type == ResourceType::Image {
                    if let Ok(mut urls) = intercepted_images.lock() {
                        urls.push(event.request.url.clone());
                    }
                }
                let abort = FailRequestParams::new(
                    event.request_id.clone(),
                    ErrorReason::BlockedByClient,
                );
                if let Err(e) = page.execute(abort).await {
                    debug!("aborting request: {e}");
                }
            } else if let Err(e) = page
                .execute(ContinueRequestParams::new(event.request_id.clone()))
                .await
            {
                debug!("continuing request: {e}");
            }
        }
    });

    Ok(())
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), DriverError> {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await {
            Err(_) => Err(DriverError::Timeout(format!("navigating to {url}"))),
            Ok(Err(e)) => Err(DriverError::Failed(format!("navigating to {url}: {e}"))),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn wait_for_selector(&mut self, css: &str, timeout_ms: u64) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(css).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!("waiting for {css}")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_idle(&mut self, timeout_ms: u64) -> Result<(), DriverError> {
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.wait_for_navigation(),
        )
        .await
        {
            Err(_) => Err(DriverError::Timeout("waiting for network idle".into())),
            Ok(Err(e)) => Err(DriverError::Failed(format!("waiting for idle: {e}"))),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Failed(format!("reading page content: {e}")))
    }

    async fn evaluate(&mut self, js: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(js.to_string())
            .await
            .map_err(|e| DriverError::Failed(format!("evaluating script: {e}")))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&mut self) -> String {
        match self.page.url().await {
            Ok(Some(url)) => url.to_string(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!("reading current url: {e}");
                String::new()
            }
        }
    }

    async fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        domain: &str,
    ) -> Result<(), DriverError> {
        let cookie = CookieParam::builder()
            .name(name)
            .value(value)
            .domain(domain)
            .path("/")
            .build()
            .map_err(|e| DriverError::Failed(format!("building cookie {name}: {e}")))?;
        self.page
            .set_cookie(cookie)
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Failed(format!("setting cookie {name}: {e}")))
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, DriverError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Failed(format!("reading cookies: {e}")))?;
        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
            })
            .collect())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Failed(format!("saving screenshot: {e}")))
    }

    fn drain_intercepted_images(&mut self) -> Vec<String> {
        match self.intercepted_images.lock() {
            Ok(mut urls) => std::mem::take(&mut *urls),
            Err(_) => Vec::new(),
        }
    }
}
