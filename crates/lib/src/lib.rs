//! # jobwatch: Job Listing Change Detection
//!
//! This crate fetches a page of job postings, keeps the ones whose tags contain
//! one of the configured patterns, and notifies a recipient about the postings
//! that are not yet in the persisted known-listings store. The store is then
//! updated so the same postings are never announced twice.
//!
//! The page fetcher, blob store and mail sender are traits in [`providers`];
//! the run controller in [`pipeline`] receives them by reference.

pub mod config;
pub mod differ;
pub mod digest;
pub mod errors;
pub mod known;
pub mod matcher;
pub mod pipeline;
pub mod providers;
pub mod types;

pub use crate::config::{get_config, AppConfig};
pub use errors::{ConfigError, FetchError, RunError, SendError, StoreError};
pub use pipeline::{execute_run, JobWatcher, RunState};
pub use types::{ListingDetails, ListingMap, RunOutcome, RunRequest, RunResult};
