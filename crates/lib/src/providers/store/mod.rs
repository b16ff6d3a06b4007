pub mod fs;
pub mod http;
pub mod s3;

use crate::errors::StoreError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// The result of a lookup. A missing object is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLookup {
    Found(Vec<u8>),
    NotFound,
}

/// A key-value blob store addressed by namespace (bucket) and key.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug + DynClone {
    /// Returns the name of the backend (e.g., "filesystem", "http", "s3").
    fn name(&self) -> &str;

    async fn get(&self, namespace: &str, key: &str) -> Result<StoreLookup, StoreError>;

    /// Replaces the object at `namespace/key` with `bytes`.
    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

dyn_clone::clone_trait_object!(BlobStore);

/// Rejects namespaces and keys that could escape their bucket.
pub(crate) fn validate_location(namespace: &str, key: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidLocation {
        namespace: namespace.to_string(),
        key: key.to_string(),
        reason,
    };

    for part in [namespace, key] {
        if part.trim().is_empty() {
            return Err(invalid("namespace and key must not be empty"));
        }
        if part == "." || part == ".." || part.contains(['/', '\\']) {
            return Err(invalid("path separators and dot segments are not allowed"));
        }
        if part.chars().any(char::is_control) {
            return Err(invalid("control characters are not allowed"));
        }
    }
    Ok(())
}
