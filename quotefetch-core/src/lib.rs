//! quotefetch core — price series download and CSV persistence.
//!
//! This crate holds everything behind the `quotefetch` binary:
//! - Price records, fetch requests, and the provider trait
//! - The Yahoo Finance chart provider and the S&P 500 constituent scraper
//! - Canonical ordering of provider output
//! - CSV export with fixed, lower-case headers
//! - The fetch → canonicalize → persist procedure for each run mode

pub mod config;
pub mod data;
pub mod export;
pub mod procedure;

pub use config::ProviderConfig;
pub use procedure::{Mode, ModeFlags, Outcome, Procedure, UsageError};
