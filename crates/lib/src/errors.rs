use jobwatch_html::HtmlError;
use thiserror::Error;

/// Errors returned by a page fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("'{url}' returned status {status}")]
    Status { url: String, status: u16 },
    #[error("'{url}' has no listing elements")]
    NoContent { url: String },
    #[error("{0}")]
    Other(String),
}

/// Errors returned by a blob store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store location '{namespace}/{key}': {reason}")]
    InvalidLocation {
        namespace: String,
        key: String,
        reason: &'static str,
    },
    #[error("Filesystem store error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Object store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to encode known listings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Invalid object store URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("S3 {operation} of '{namespace}/{key}' failed: {reason}")]
    S3 {
        operation: &'static str,
        namespace: String,
        key: String,
        reason: String,
    },
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors returned by a mail sender.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Mail relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mail relay rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid mail address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Failed to build mail message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Mail transport error: {0}")]
    Transport(String),
}

/// Errors raised while loading configuration or resolving credentials.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
    #[error("Credential '{0}' is not configured")]
    MissingCredential(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// Every way a run can end early.
///
/// A `RunError` never leaves the run controller; it is converted into a
/// [`RunResult`](crate::types::RunResult) at the boundary.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid listing selectors: {0}")]
    Selectors(#[from] HtmlError),
    #[error("Failed to set up collaborators: {0}")]
    Setup(String),
    #[error("Error fetching content on {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("Known-listings store {location} is not valid JSON: {source}")]
    CorruptStore {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to send notification for {count} new job listings: {source}")]
    Notify {
        count: usize,
        #[source]
        source: SendError,
    },
    #[error(
        "Notification for {count} new job listings was sent but {location} was not updated: \
         {source}. A retry may notify the same listings again."
    )]
    Persist {
        count: usize,
        location: String,
        #[source]
        source: StoreError,
    },
}
