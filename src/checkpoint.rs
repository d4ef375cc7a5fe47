//! Resume checkpoint for incremental catalog walks.
//!
//! A single overwritten marker of the last completed catalog page.
//! Persistence is best-effort: a missing or corrupt checkpoint resumes
//! from page 1, and write failures never abort a crawl.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Checkpoint file name inside the output directory.
pub const CHECKPOINT_FILE: &str = "catalog_checkpoint.json";

/// Last completed catalog page of an incremental run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCheckpoint {
    pub last_page: u32,
}

/// Path of the checkpoint file under `out_dir`.
pub fn path(out_dir: &Path) -> PathBuf {
    out_dir.join(CHECKPOINT_FILE)
}

/// Load the checkpoint. Missing or unreadable files yield `None`.
pub fn load(out_dir: &Path) -> Option<CatalogCheckpoint> {
    let data = std::fs::read_to_string(path(out_dir)).ok()?;
    serde_json::from_str(&data).ok()
}

/// Store the checkpoint, overwriting any previous one. Failures are
/// logged and swallowed; resumability is not a crawl-correctness
/// requirement.
pub fn store(out_dir: &Path, checkpoint: &CatalogCheckpoint) {
    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(out_dir)?;
        let json = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(path(out_dir), json)
    };
    if let Err(e) = write() {
        debug!("checkpoint write failed: {e}");
    }
}
