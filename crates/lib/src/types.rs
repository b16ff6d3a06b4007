//! # Core Types
//!
//! Listings, the request that starts a run, and the result every run ends with.

use crate::errors::{ConfigError, RunError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

pub const STATUS_NOTIFIED: u16 = 200;
pub const STATUS_NOT_MODIFIED: u16 = 304;
pub const STATUS_FAILED: u16 = 500;

/// The attributes of one job posting. Its identity, the link, is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDetails {
    pub title: String,
    pub description: String,
}

/// An ordered mapping from listing link to its details.
///
/// Used for the match set, the new-listings set and the persisted
/// known-listings store alike. Iteration follows insertion order.
pub type ListingMap = IndexMap<String, ListingDetails>;

/// One run of the pipeline, usually deserialized from a trigger event.
///
/// The original event field names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// The page of postings to fetch.
    pub url: String,
    /// The key of the known-listings object.
    #[serde(alias = "s3_filename")]
    pub store_key: String,
    /// Who receives the digest.
    #[serde(alias = "gmail_address")]
    pub recipient: String,
    /// Name of the mail credential in process configuration, never the secret.
    #[serde(default)]
    pub credential_ref: Option<String>,
    /// Literal, case-sensitive substrings; the first hit per listing wins.
    #[serde(alias = "patterns_to_search")]
    pub patterns: Vec<String>,
    /// The bucket holding the known-listings object.
    #[serde(alias = "s3_bucket_name")]
    pub namespace: String,
}

impl RunRequest {
    /// Checks the request before any collaborator is contacted and returns the
    /// parsed page URL.
    pub fn validate(&self) -> Result<Url, RunError> {
        if self.patterns.is_empty() {
            return Err(RunError::InvalidRequest(
                "at least one pattern is required".to_string(),
            ));
        }
        if self.patterns.iter().any(|pattern| pattern.is_empty()) {
            return Err(RunError::InvalidRequest(
                "patterns must not be empty strings".to_string(),
            ));
        }
        for (field, value) in [
            ("store_key", &self.store_key),
            ("namespace", &self.namespace),
            ("recipient", &self.recipient),
        ] {
            if value.trim().is_empty() {
                return Err(RunError::InvalidRequest(format!("`{field}` is required")));
            }
        }

        let url = Url::parse(self.url.trim())
            .map_err(|e| RunError::InvalidRequest(format!("invalid url '{}': {e}", self.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(RunError::InvalidRequest(format!(
                "unsupported url scheme '{other}'"
            ))),
        }
    }

    /// `namespace/key`, used in logs and messages.
    pub fn store_location(&self) -> String {
        format!("{}/{}", self.namespace, self.store_key)
    }
}

/// The terminal state a run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Notified,
    /// The mail transport does not deliver; nothing was sent or recorded.
    DryRun,
    NoMatch,
    AlreadyKnown,
    FetchFailed,
    StoreUnreadable,
    NotifyFailed,
    PersistFailed,
    InvalidRequest,
    SetupFailed,
}

/// The structured response of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// 200 notified, 304 nothing to do, 500 failure.
    pub status_code: u16,
    pub body: String,
    pub outcome: RunOutcome,
    /// How many listings were sent in the digest.
    #[serde(default)]
    pub new_listings: usize,
}

impl RunResult {
    pub fn notified(count: usize) -> Self {
        Self {
            status_code: STATUS_NOTIFIED,
            body: format!("Notification with {count} new job listings sent"),
            outcome: RunOutcome::Notified,
            new_listings: count,
        }
    }

    pub fn dry_run(count: usize) -> Self {
        Self {
            status_code: STATUS_NOTIFIED,
            body: format!("Dry run: {count} new job listings found, nothing sent or recorded"),
            outcome: RunOutcome::DryRun,
            new_listings: count,
        }
    }

    pub fn no_match() -> Self {
        Self {
            status_code: STATUS_NOT_MODIFIED,
            body: "No job listings match search criteria".to_string(),
            outcome: RunOutcome::NoMatch,
            new_listings: 0,
        }
    }

    pub fn already_known() -> Self {
        Self {
            status_code: STATUS_NOT_MODIFIED,
            body: "Job listings already processed, nothing to do".to_string(),
            outcome: RunOutcome::AlreadyKnown,
            new_listings: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status_code >= STATUS_FAILED
    }
}

impl From<RunError> for RunResult {
    fn from(err: RunError) -> Self {
        let outcome = match &err {
            RunError::InvalidRequest(_) => RunOutcome::InvalidRequest,
            // The credential name comes from the request.
            RunError::Config(ConfigError::MissingCredential(_)) => RunOutcome::InvalidRequest,
            RunError::Config(_) | RunError::Selectors(_) | RunError::Setup(_) => {
                RunOutcome::SetupFailed
            }
            RunError::Fetch { .. } => RunOutcome::FetchFailed,
            RunError::CorruptStore { .. } => RunOutcome::StoreUnreadable,
            RunError::Notify { .. } => RunOutcome::NotifyFailed,
            RunError::Persist { .. } => RunOutcome::PersistFailed,
        };
        let new_listings = match &err {
            RunError::Persist { count, .. } => *count,
            _ => 0,
        };
        Self {
            status_code: STATUS_FAILED,
            body: err.to_string(),
            outcome,
            new_listings,
        }
    }
}
