//! # External Collaborators
//!
//! The pipeline talks to the outside world through three traits: a page
//! fetcher, a key-value blob store and a mail sender. Concrete backends live in
//! the sub-modules and are wired together by [`factory::build_collaborators`].

pub mod factory;
pub mod fetcher;
pub mod mail;
pub mod store;

pub use fetcher::{FetchedPage, HttpPageFetcher, PageFetcher};
pub use mail::{HttpMailSender, LogMailSender, MailMessage, MailSender, SmtpMailSender};
pub use store::{
    fs::FsBlobStore, http::HttpBlobStore, s3::S3BlobStore, BlobStore, StoreLookup,
};

/// The collaborators of a single run.
///
/// Built once per run invocation and lent to the run controller by reference.
#[derive(Clone, Debug)]
pub struct Collaborators {
    pub fetcher: Box<dyn PageFetcher>,
    pub store: Box<dyn BlobStore>,
    pub mailer: Box<dyn MailSender>,
}
