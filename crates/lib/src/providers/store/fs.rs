//! A blob store on the local filesystem: one directory per namespace, one
//! file per key.

use super::{validate_location, BlobStore, StoreLookup};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, namespace: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_location(namespace, key)?;
        Ok(self.root.join(namespace).join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<StoreLookup, StoreError> {
        let path = self.path_for(namespace, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(StoreLookup::Found(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreLookup::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(namespace, key)?;
        tokio::fs::create_dir_all(self.root.join(namespace)).await?;

        // Write beside the target and rename so readers never see a partial file.
        let staging = path.with_file_name(format!(".{key}.partial"));
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}
