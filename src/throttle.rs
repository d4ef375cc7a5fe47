//! Politeness throttle between page fetches.
//!
//! A fixed minimum interval since the previous fetch, nothing more: no
//! backoff, no retries. The crawl runs a single page at a time, so this
//! is the only pacing mechanism the site sees.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum delay between consecutive fetches.
pub struct Throttle {
    min_delay: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl Throttle {
    /// `delay_secs` is the minimum interval between fetches.
    pub fn new(delay_secs: f64) -> Self {
        Self {
            min_delay: Duration::from_secs_f64(delay_secs.max(0.0)),
            last_fetch: Mutex::new(None),
        }
    }

    /// Sleep until the minimum interval since the previous fetch has
    /// passed, then mark this fetch. The first fetch never waits.
    pub async fn wait(&self) {
        let mut last = self.last_fetch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
