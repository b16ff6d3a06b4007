//! A blob store on Amazon S3 (or an S3-compatible service). The namespace is
//! the bucket, the key is the object key.

use super::{validate_location, BlobStore, StoreLookup};
use crate::errors::StoreError;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client as S3Client,
};
use tracing::info;

#[derive(Clone, Debug)]
pub struct S3BlobStore {
    client: S3Client,
}

impl S3BlobStore {
    /// Loads credentials and region from the standard AWS environment
    /// (variables, profile, instance or task role).
    ///
    /// A custom `endpoint_url` switches to path-style addressing.
    pub async fn from_env(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint_url) = endpoint_url {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        Self::from_client(S3Client::from_conf(builder.build()))
    }

    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

fn s3_error<E>(operation: &'static str, namespace: &str, key: &str, err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::S3 {
        operation,
        namespace: namespace.to_string(),
        key: key.to_string(),
        reason: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<StoreLookup, StoreError> {
        validate_location(namespace, key)?;
        let output = match self
            .client
            .get_object()
            .bucket(namespace)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key()) =>
            {
                return Ok(StoreLookup::NotFound);
            }
            Err(err) => return Err(s3_error("get", namespace, key, err)),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| s3_error("get", namespace, key, e))?
            .into_bytes();
        Ok(StoreLookup::Found(bytes.to_vec()))
    }

    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate_location(namespace, key)?;
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(namespace)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| s3_error("put", namespace, key, e))?;

        info!("Wrote {size} bytes to s3://{namespace}/{key}");
        Ok(())
    }
}
