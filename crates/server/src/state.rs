//! # Application State
//!
//! The configuration shared by every request, plus one async lock per
//! known-listings object so that two runs never read-modify-write the same
//! store key at the same time.

use jobwatch::AppConfig;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// The shared application state, accessible from all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The application's configuration, loaded from `jobwatch.yml`.
    pub config: Arc<AppConfig>,
    pub run_locks: RunLocks,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            run_locks: RunLocks::default(),
        }
    }
}

/// Lazily created locks keyed by `namespace/key`. An entry lives only while
/// a run holds it or waits for it.
#[derive(Clone, Debug, Default)]
pub struct RunLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RunLocks {
    /// Waits until no other run holds `location`, then holds it until the
    /// returned lease is dropped.
    pub async fn acquire(&self, location: &str) -> RunLease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(location.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        RunLease {
            guard: Some(lock.lock_owned().await),
            location: location.to_string(),
            locks: self.clone(),
        }
    }

    /// Number of store keys with a lock currently in the map.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn release(&self, location: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map's own reference left: no holder and no waiter.
        if locks
            .get(location)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(location);
        }
    }
}

/// Exclusive hold on one store key.
#[derive(Debug)]
pub struct RunLease {
    guard: Option<OwnedMutexGuard<()>>,
    location: String,
    locks: RunLocks,
}

impl Drop for RunLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.location);
    }
}
