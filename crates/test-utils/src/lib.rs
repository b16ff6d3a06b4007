//! Test doubles for the `jobwatch` collaborators and fixtures for listing pages.
//!
//! Every double keeps its state behind an `Arc`, so a clone handed to the run
//! controller and the clone kept by the test observe the same calls.

use async_trait::async_trait;
use jobwatch::{
    errors::{FetchError, SendError, StoreError},
    providers::{
        BlobStore, Collaborators, FetchedPage, MailMessage, MailSender, PageFetcher, StoreLookup,
    },
    ListingMap, RunRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Page Fetcher ---

/// Returns a scripted response and records requested URLs.
#[derive(Clone, Debug)]
pub struct MockPageFetcher {
    response: Arc<Mutex<Result<FetchedPage, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPageFetcher {
    /// Answers every request with status 200 and `body`.
    pub fn with_body(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(FetchedPage {
                status,
                body: body.into(),
            }))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every request with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Err(message.into()))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Changes the page served from now on.
    pub fn set_body(&self, body: impl Into<String>) {
        *self.response.lock().unwrap() = Ok(FetchedPage {
            status: 200,
            body: body.into(),
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(FetchError::Other)
    }
}

// --- Blob Store ---

/// An in-memory blob store with failure injection.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, namespace: &str, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), bytes.to_vec());
    }

    /// Seeds the store with `listings` encoded the way the pipeline writes them.
    pub fn insert_listings(&self, namespace: &str, key: &str, listings: &ListingMap) {
        self.insert_raw(namespace, key, &serde_json::to_vec(listings).unwrap());
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    /// Decodes the listings stored at `namespace/key`.
    pub fn listings(&self, namespace: &str, key: &str) -> Option<ListingMap> {
        self.raw(namespace, key)
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<StoreLookup, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".to_string()));
        }
        Ok(match self.raw(namespace, key) {
            Some(bytes) => StoreLookup::Found(bytes),
            None => StoreLookup::NotFound,
        })
    }

    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert_raw(namespace, key, &bytes);
        Ok(())
    }
}

// --- Mail Sender ---

/// Records every message it is asked to send.
#[derive(Clone, Debug, Default)]
pub struct RecordingMailSender {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail. Failed sends are not recorded.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), SendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendError::Transport("injected send failure".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// --- Harness ---

/// The three doubles plus handles to inspect them after a run.
pub struct TestCollaborators {
    pub fetcher: MockPageFetcher,
    pub store: MemoryBlobStore,
    pub mailer: RecordingMailSender,
    pub collaborators: Collaborators,
}

impl TestCollaborators {
    pub fn new(fetcher: MockPageFetcher) -> Self {
        let store = MemoryBlobStore::new();
        let mailer = RecordingMailSender::new();
        let collaborators = Collaborators {
            fetcher: Box::new(fetcher.clone()),
            store: Box::new(store.clone()),
            mailer: Box::new(mailer.clone()),
        };
        Self {
            fetcher,
            store,
            mailer,
            collaborators,
        }
    }
}

pub const TEST_NAMESPACE: &str = "test-bucket";
pub const TEST_STORE_KEY: &str = "processed_jobs.json";
pub const TEST_RECIPIENT: &str = "me@example.com";

/// A request against the test namespace and key.
pub fn run_request(url: &str, patterns: &[&str]) -> RunRequest {
    RunRequest {
        url: url.to_string(),
        store_key: TEST_STORE_KEY.to_string(),
        recipient: TEST_RECIPIENT.to_string(),
        credential_ref: None,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        namespace: TEST_NAMESPACE.to_string(),
    }
}

// --- Fixtures ---

pub mod fixtures {
    /// One posting on a fixture page.
    #[derive(Debug, Clone)]
    pub struct FixtureListing {
        pub title: String,
        pub link: Option<String>,
        pub markers: Vec<String>,
    }

    pub fn listing(title: &str, link: &str, markers: &[&str]) -> FixtureListing {
        FixtureListing {
            title: title.to_string(),
            link: Some(link.to_string()),
            markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn unlinked_listing(title: &str, markers: &[&str]) -> FixtureListing {
        FixtureListing {
            link: None,
            ..listing(title, "", markers)
        }
    }

    /// Renders a page shaped like the job board: classed navigation items and
    /// one unclassed `<li>` per posting.
    pub fn listing_page(listings: &[FixtureListing]) -> String {
        let items: String = listings
            .iter()
            .map(|listing| {
                let title = match &listing.link {
                    Some(link) => format!(r#"<a href="{link}">{}</a>"#, listing.title),
                    None => listing.title.clone(),
                };
                let markers: String = listing
                    .markers
                    .iter()
                    .map(|marker| format!(r#"<span class="dotted">{marker}</span> "#))
                    .collect();
                format!(
                    r#"<li class="">
                        <p class="mv0 f3 lh-title">{title}</p>
                        <div>{markers}</div>
                    </li>"#
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
            <html>
                <head><title>Remote Kubernetes Jobs</title></head>
                <body>
                    <ul class="nav"><li class="nav-item">Home</li><li class="nav-item">Post a job</li></ul>
                    <ul>{items}</ul>
                </body>
            </html>"#
        )
    }
}
