#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Spawns the server on a random port with a filesystem store in a temp
//! directory, next to a `wiremock` server that plays both the job board and
//! the mail relay (`POST /send`).

use jobwatch::config::{AppConfig, MailConfig, StoreConfig};
use jobwatch_server::run;
use std::sync::Once;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("jobwatch=debug,jobwatch_server=debug")
            .with_test_writer()
            .try_init();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub board: MockServer,
    pub store_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> anyhow::Result<Self> {
        setup_tracing();
        let board = MockServer::start().await;
        let store_dir = tempfile::tempdir()?;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&board)
            .await;

        let config = AppConfig {
            store: StoreConfig {
                root: store_dir.path().to_string_lossy().into_owned(),
                ..StoreConfig::default()
            },
            mail: MailConfig {
                api_url: Some(format!("{}/send", board.uri())),
                ..MailConfig::default()
            },
            ..AppConfig::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            if let Err(e) = run(listener, config).await {
                eprintln!("Server error: {e}");
            }
        });

        Ok(Self {
            address,
            client: reqwest::Client::new(),
            board,
            store_dir,
        })
    }

    /// How many digests reached the mail relay.
    pub async fn sent_digests(&self) -> usize {
        self.board
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == "/send")
            .count()
    }

    /// URL of `path` on the mock job board.
    pub fn board_url(&self, path: &str) -> String {
        format!("{}{path}", self.board.uri())
    }
}
