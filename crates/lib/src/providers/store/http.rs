//! A blob store behind a plain HTTP object endpoint:
//! `GET`/`PUT {base_url}/{namespace}/{key}`, with 404 meaning "not found".
//!
//! Namespace and key are percent-encoded as single path segments, so `?`, `#`
//! or `%` in a key never change which object is addressed.

use super::{validate_location, BlobStore, StoreLookup};
use crate::errors::StoreError;
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use url::Url;

#[derive(Clone, Debug)]
pub struct HttpBlobStore {
    client: ReqwestClient,
    base_url: Url,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self, StoreError> {
        let invalid = |reason: String| StoreError::InvalidBaseUrl {
            url: base_url.clone(),
            reason,
        };
        let parsed = Url::parse(&base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base".to_string()));
        }

        let client = ReqwestClient::builder().build()?;
        Ok(Self {
            client,
            base_url: parsed,
            token,
        })
    }

    /// Builds `{base_url}/{namespace}/{key}` with both parts escaped.
    pub fn object_url(&self, namespace: &str, key: &str) -> Result<Url, StoreError> {
        validate_location(namespace, key)?;
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(namespace)
            .push(key);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<StoreLookup, StoreError> {
        let url = self.object_url(namespace, key)?;
        let response = self.authorize(self.client.get(url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(StoreLookup::NotFound);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        Ok(StoreLookup::Found(response.bytes().await?.to_vec()))
    }

    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let url = self.object_url(namespace, key)?;
        let response = self
            .authorize(self.client.put(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(())
    }
}
