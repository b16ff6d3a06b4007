//! # Run Controller
//!
//! Drives one run: fetch the page, extract listing elements, match patterns,
//! diff against the known listings, notify, then persist. Every terminal state
//! is turned into exactly one [`RunResult`].
//!
//! Notification happens before persistence. If the store write fails after the
//! digest went out, the run reports `PersistFailed` so the operator knows a retry
//! may send the same listings again. If the notification fails, nothing is
//! persisted. A mail sender that does not deliver turns the run into a dry
//! run, which reports `DryRun` and leaves the store untouched.
//!
//! A run performs one read-modify-write on the store with no concurrency check.
//! Callers must not run two pipelines against the same store key at once.

use crate::{
    config::AppConfig,
    differ::{diff_listings, merge_known},
    digest::{compose_digest, fetch_error_subject, render_subject},
    errors::{FetchError, RunError},
    known::{load_known_listings, save_known_listings},
    matcher::match_listings,
    providers::{
        factory::build_collaborators, BlobStore, Collaborators, MailMessage, MailSender,
        PageFetcher,
    },
    types::{ListingMap, RunRequest, RunResult},
};
use jobwatch_html::{ListingPage, ListingScanner, ListingSelectors};
use std::fmt;
use tracing::{error, info, warn};

const HTTP_OK: u16 = 200;

/// The states a run moves through, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Fetching,
    Extracting,
    Matching,
    Diffing,
    Notifying,
    Persisting,
    Done,
    FetchFailed,
    NoMatch,
    AlreadyKnown,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Fetching => "FETCHING",
            RunState::Extracting => "EXTRACTING",
            RunState::Matching => "MATCHING",
            RunState::Diffing => "DIFFING",
            RunState::Notifying => "NOTIFYING",
            RunState::Persisting => "PERSISTING",
            RunState::Done => "DONE",
            RunState::FetchFailed => "FETCH_FAILED",
            RunState::NoMatch => "NO_MATCH",
            RunState::AlreadyKnown => "ALREADY_KNOWN",
        };
        f.write_str(name)
    }
}

/// The run controller, borrowing the collaborators of one run.
pub struct JobWatcher<'a> {
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn BlobStore,
    mailer: &'a dyn MailSender,
    scanner: ListingScanner,
    from_address: Option<String>,
    subject_template: String,
}

impl<'a> JobWatcher<'a> {
    pub fn new(collaborators: &'a Collaborators, scanner: ListingScanner) -> Self {
        Self {
            fetcher: collaborators.fetcher.as_ref(),
            store: collaborators.store.as_ref(),
            mailer: collaborators.mailer.as_ref(),
            scanner,
            from_address: None,
            subject_template: "New job listings from {host}!".to_string(),
        }
    }

    /// Sender address; the recipient is used when unset.
    pub fn with_from_address(mut self, from_address: Option<String>) -> Self {
        self.from_address = from_address;
        self
    }

    pub fn with_subject(mut self, subject_template: impl Into<String>) -> Self {
        self.subject_template = subject_template.into();
        self
    }

    /// Runs the pipeline to a terminal state. Never fails; errors are reported
    /// in the returned result.
    pub async fn run(&self, request: &RunRequest) -> RunResult {
        match self.try_run(request).await {
            Ok(result) => {
                info!(status = result.status_code, "{}", result.body);
                result
            }
            Err(err) => {
                error!("Run for {} failed: {err}", request.url);
                RunResult::from(err)
            }
        }
    }

    async fn try_run(&self, request: &RunRequest) -> Result<RunResult, RunError> {
        let page_url = request.validate()?;
        let from = self
            .from_address
            .clone()
            .unwrap_or_else(|| request.recipient.clone());

        info!(state = %RunState::Fetching, "Retrieving webpage content: {}", request.url);
        let matched = match self.fetch_and_match(request).await {
            Ok(matched) => matched,
            Err(source) => return Err(self.report_fetch_failure(request, &from, source).await),
        };

        if matched.is_empty() {
            info!(state = %RunState::NoMatch, "No job listings match search criteria");
            return Ok(RunResult::no_match());
        }

        info!(
            state = %RunState::Diffing,
            matched = matched.len(),
            "Checking if results have been already processed..."
        );
        let known =
            load_known_listings(self.store, &request.namespace, &request.store_key).await?;
        let diff = diff_listings(&matched, &known);
        if !diff.any_new {
            info!(
                state = %RunState::AlreadyKnown,
                "All {} matches are already in the known-listings store",
                diff.already_known.len()
            );
            return Ok(RunResult::already_known());
        }

        let count = diff.new_listings.len();
        info!(
            state = %RunState::Notifying,
            new = count,
            "Sending digest to {}",
            request.recipient
        );
        let message = MailMessage {
            from,
            to: request.recipient.clone(),
            subject: render_subject(&self.subject_template, &page_url),
            body: compose_digest(&diff.new_listings),
        };
        self.mailer
            .send(&message)
            .await
            .map_err(|source| RunError::Notify { count, source })?;

        if !self.mailer.delivers() {
            warn!(
                state = %RunState::Done,
                "Dry run: digest not delivered, leaving {} untouched",
                request.store_location()
            );
            return Ok(RunResult::dry_run(count));
        }

        info!(
            state = %RunState::Persisting,
            "Updating known-listings store {}",
            request.store_location()
        );
        let merged = merge_known(known, &diff.new_listings);
        save_known_listings(self.store, &request.namespace, &request.store_key, &merged)
            .await
            .map_err(|source| RunError::Persist {
                count,
                location: request.store_location(),
                source,
            })?;

        info!(state = %RunState::Done, "Recorded {count} new job listings");
        Ok(RunResult::notified(count))
    }

    async fn fetch_and_match(&self, request: &RunRequest) -> Result<ListingMap, FetchError> {
        let page = self.fetcher.fetch(&request.url).await?;
        if page.status != HTTP_OK {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: page.status,
            });
        }
        self.extract_matches(&request.url, &page.body, &request.patterns)
    }

    // Synchronous so the parsed document never lives across an `.await`.
    fn extract_matches(
        &self,
        url: &str,
        markup: &str,
        patterns: &[String],
    ) -> Result<ListingMap, FetchError> {
        info!(state = %RunState::Extracting, bytes = markup.len(), "Extracting listing elements");
        let page = ListingPage::parse(markup);
        let elements = page.listing_elements();
        if elements.is_empty() {
            return Err(FetchError::NoContent {
                url: url.to_string(),
            });
        }

        info!(
            state = %RunState::Matching,
            elements = elements.len(),
            "Checking job listings for matches..."
        );
        Ok(match_listings(&self.scanner, &elements, patterns))
    }

    async fn report_fetch_failure(
        &self,
        request: &RunRequest,
        from: &str,
        source: FetchError,
    ) -> RunError {
        warn!(
            state = %RunState::FetchFailed,
            "Cannot retrieve {} content: {source}",
            request.url
        );
        let message = MailMessage {
            from: from.to_string(),
            to: request.recipient.clone(),
            subject: fetch_error_subject(&request.url),
            body: String::new(),
        };
        if let Err(e) = self.mailer.send(&message).await {
            error!("Failed to send fetch error notification: {e}");
        }
        RunError::Fetch {
            url: request.url.clone(),
            source,
        }
    }
}

/// Builds the collaborators for one run from `config` and executes it.
///
/// This is the entry point used by the CLI and the server.
pub async fn execute_run(config: &AppConfig, request: &RunRequest) -> RunResult {
    // Reject bad input before any credential is resolved.
    if let Err(err) = request.validate() {
        error!("Rejected run request for {}: {err}", request.url);
        return RunResult::from(err);
    }
    let collaborators = match build_collaborators(config, request).await {
        Ok(collaborators) => collaborators,
        Err(err) => {
            error!("Cannot prepare run for {}: {err}", request.url);
            return RunResult::from(err);
        }
    };
    let scanner = match ListingScanner::new(&ListingSelectors::from(&config.selectors)) {
        Ok(scanner) => scanner,
        Err(err) => {
            error!("Cannot prepare run for {}: {err}", request.url);
            return RunResult::from(RunError::from(err));
        }
    };

    JobWatcher::new(&collaborators, scanner)
        .with_from_address(config.mail.from_address.clone())
        .with_subject(config.mail.subject.clone())
        .run(request)
        .await
}
