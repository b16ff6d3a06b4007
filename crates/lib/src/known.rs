//! # Known-Listings Store
//!
//! Reads and writes the persisted set of already-notified listings: a JSON
//! object mapping link to `{title, description}`.

use crate::{
    errors::{RunError, StoreError},
    providers::{BlobStore, StoreLookup},
    types::ListingMap,
};
use tracing::{info, warn};

/// Loads the known listings at `namespace/key`.
///
/// A missing object, an empty object, or a backend read failure all yield an
/// empty set so the first run can bootstrap. Bytes that are present but not
/// valid JSON are an error, so an unreadable store is never overwritten.
pub async fn load_known_listings(
    store: &dyn BlobStore,
    namespace: &str,
    key: &str,
) -> Result<ListingMap, RunError> {
    let location = format!("{namespace}/{key}");
    match store.get(namespace, key).await {
        Ok(StoreLookup::Found(bytes)) if bytes.iter().all(u8::is_ascii_whitespace) => {
            info!("Known-listings store {location} is empty.");
            Ok(ListingMap::new())
        }
        Ok(StoreLookup::Found(bytes)) => {
            let known: ListingMap = serde_json::from_slice(&bytes)
                .map_err(|source| RunError::CorruptStore { location: location.clone(), source })?;
            info!("Loaded {} known listings from {location}.", known.len());
            Ok(known)
        }
        Ok(StoreLookup::NotFound) => {
            info!("Known-listings store {location} not found. Starting from an empty set.");
            Ok(ListingMap::new())
        }
        Err(e) => {
            warn!("Cannot read known-listings store {location}: {e}. Treating it as empty.");
            Ok(ListingMap::new())
        }
    }
}

/// Writes the full set of known listings back to `namespace/key`.
pub async fn save_known_listings(
    store: &dyn BlobStore,
    namespace: &str,
    key: &str,
    known: &ListingMap,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(known)?;
    store.put(namespace, key, bytes).await?;
    info!("Known-listings store {namespace}/{key} updated successfully.");
    Ok(())
}
