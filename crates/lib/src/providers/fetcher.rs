use crate::errors::FetchError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use reqwest::Client as ReqwestClient;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

/// The raw result of fetching a page. Any status is returned as-is; deciding
/// what counts as a failure is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Retrieves page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync + Debug + DynClone {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

dyn_clone::clone_trait_object!(PageFetcher);

/// Fetches pages over HTTP with a bounded wait.
#[derive(Clone, Debug)]
pub struct HttpPageFetcher {
    client: ReqwestClient,
}

impl HttpPageFetcher {
    /// Creates a fetcher whose requests fail once `timeout` has elapsed.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_error)?;
        debug!(url, status, bytes = body.len(), "Fetched page");

        Ok(FetchedPage { status, body })
    }
}
