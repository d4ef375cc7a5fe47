//! Catalog crawler for the ETMOC tobacco product directory.
//!
//! The site gates every page behind a cookie + device-fingerprint
//! verification challenge. This crate establishes a verified browser
//! session, walks the paginated product directory (resumable via a
//! checkpoint), and extracts normalized product records from the
//! semi-structured detail pages.

pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod export;
pub mod extract;
pub mod orchestrator;
pub mod pagination;
pub mod session;
pub mod text;
pub mod throttle;
pub mod urls;
pub mod walker;
