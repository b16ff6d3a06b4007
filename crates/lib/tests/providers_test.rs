//! # Collaborator Backend Tests
//!
//! Exercises the HTTP fetcher, mail relay and object store against a
//! `wiremock` server, and the filesystem store against a temp directory.

mod common;

use common::setup_tracing;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use jobwatch::config::SmtpTls;
use jobwatch::errors::{SendError, StoreError};
use jobwatch::providers::{
    BlobStore, FsBlobStore, HttpBlobStore, HttpMailSender, HttpPageFetcher, MailMessage,
    MailSender, PageFetcher, S3BlobStore, SmtpMailSender, StoreLookup,
};
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn message() -> MailMessage {
    MailMessage {
        from: "alerts@jobwatch.test".to_string(),
        to: "me@example.com".to_string(),
        subject: "New job listings from jobs.test!".to_string(),
        body: "Title: SRE\nDescription: remote from Europe\nLink: https://jobs.test/1\n\n"
            .to_string(),
    }
}

#[tokio::test]
async fn test_http_fetcher_returns_status_and_body() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remote-jobs"))
        .and(header("user-agent", "jobwatch-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ul><li>job</li></ul>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;
    let fetcher = HttpPageFetcher::new(Duration::from_secs(5), "jobwatch-test").unwrap();

    // --- 2. Act ---
    let page = fetcher
        .fetch(&format!("{}/remote-jobs", server.uri()))
        .await
        .unwrap();
    let missing = fetcher.fetch(&format!("{}/gone", server.uri())).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(page.status, 200);
    assert_eq!(page.body, "<ul><li>job</li></ul>");
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn test_http_fetcher_times_out() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let fetcher = HttpPageFetcher::new(Duration::from_millis(200), "jobwatch-test").unwrap();

    // --- 2. Act ---
    let result = fetcher.fetch(&server.uri()).await;

    // --- 3. Assert ---
    assert!(result.is_err(), "expected a timeout, got {result:?}");
}

#[tokio::test]
async fn test_http_mail_sender_posts_message() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let expected = message();
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer relay-key"))
        .and(body_json(json!({
            "from": expected.from,
            "to": expected.to,
            "subject": expected.subject,
            "text": expected.body,
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    let sender =
        HttpMailSender::new(format!("{}/send", server.uri()), Some("relay-key".to_string()))
            .unwrap();

    // --- 2. Act ---
    let result = sender.send(&expected).await;

    // --- 3. Assert ---
    assert!(result.is_ok(), "send failed: {result:?}");
}

#[tokio::test]
async fn test_http_mail_sender_reports_rejection() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;
    let sender = HttpMailSender::new(server.uri(), None).unwrap();

    // --- 2. Act ---
    let result = sender.send(&message()).await;

    // --- 3. Assert ---
    match result {
        Err(SendError::Rejected { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_blob_store_get_and_put() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/known.json"))
        .and(header("authorization", "Bearer store-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/bucket/known.json"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"a":1}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let store =
        HttpBlobStore::new(format!("{}/", server.uri()), Some("store-token".to_string())).unwrap();

    // --- 2. Act ---
    let found = store.get("bucket", "known.json").await.unwrap();
    let missing = store.get("bucket", "missing.json").await.unwrap();
    let written = store
        .put("bucket", "known.json", br#"{"a":1}"#.to_vec())
        .await;

    // --- 3. Assert ---
    assert_eq!(found, StoreLookup::Found(b"{}".to_vec()));
    assert_eq!(missing, StoreLookup::NotFound);
    assert!(written.is_ok(), "put failed: {written:?}");
}

#[tokio::test]
async fn test_http_blob_store_surfaces_server_errors() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let store = HttpBlobStore::new(server.uri(), None).unwrap();

    // --- 2. Act ---
    let result = store.get("bucket", "known.json").await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(StoreError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_http_blob_store_escapes_reserved_characters() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/jobs%23europe.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("europe"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/jobs%3Fitaly.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("italy"))
        .mount(&server)
        .await;
    let store = HttpBlobStore::new(format!("{}/", server.uri()), None).unwrap();

    // --- 2. Act ---
    store
        .put("bucket", "jobs#europe.json", b"europe".to_vec())
        .await
        .unwrap();
    store
        .put("bucket", "jobs?italy.json", b"italy".to_vec())
        .await
        .unwrap();
    let europe = store.get("bucket", "jobs#europe.json").await.unwrap();
    let italy = store.get("bucket", "jobs?italy.json").await.unwrap();

    // --- 3. Assert ---
    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.method.as_str() == "PUT")
        .map(|request| request.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec!["/bucket/jobs%23europe.json", "/bucket/jobs%3Fitaly.json"]
    );
    assert_eq!(europe, StoreLookup::Found(b"europe".to_vec()));
    assert_eq!(italy, StoreLookup::Found(b"italy".to_vec()));
    assert_eq!(
        store.object_url("bucket", "jobs?italy.json").unwrap().query(),
        None
    );
}

#[tokio::test]
async fn test_http_blob_store_rejects_bad_base_url() {
    let result = HttpBlobStore::new("not a url".to_string(), None);
    assert!(matches!(result, Err(StoreError::InvalidBaseUrl { .. })));
}

fn s3_store(server: &MockServer) -> S3BlobStore {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
        .endpoint_url(server.uri())
        .force_path_style(true)
        .build();
    S3BlobStore::from_client(aws_sdk_s3::Client::from_conf(config))
}

#[tokio::test]
async fn test_s3_blob_store_get_and_put() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/processed_jobs.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"a":1}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/missing.json"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/xml")
                .set_body_string(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <Error><Code>NoSuchKey</Code>\
                     <Message>The specified key does not exist.</Message>\
                     <Key>missing.json</Key></Error>",
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/jobs/processed_jobs.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let store = s3_store(&server);

    // --- 2. Act ---
    let found = store.get("jobs", "processed_jobs.json").await.unwrap();
    let missing = store.get("jobs", "missing.json").await.unwrap();
    let written = store
        .put("jobs", "processed_jobs.json", br#"{"a":2}"#.to_vec())
        .await;

    // --- 3. Assert ---
    assert_eq!(found, StoreLookup::Found(br#"{"a":1}"#.to_vec()));
    assert_eq!(missing, StoreLookup::NotFound);
    assert!(written.is_ok(), "put failed: {written:?}");
    assert_eq!(store.name(), "s3");
}

#[tokio::test]
async fn test_s3_blob_store_surfaces_access_errors() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
        ))
        .mount(&server)
        .await;
    let store = s3_store(&server);

    // --- 2. Act ---
    let result = store.get("jobs", "processed_jobs.json").await;

    // --- 3. Assert ---
    assert!(
        matches!(result, Err(StoreError::S3 { operation: "get", .. })),
        "unexpected result: {result:?}"
    );
}

/// A single-connection SMTP server that accepts one message and returns the
/// client's side of the conversation.
async fn smtp_server() -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut transcript = String::new();
        let mut in_data = false;

        write.write_all(b"220 smtp.test ESMTP\r\n").await.unwrap();
        while let Some(line) = lines.next_line().await.unwrap() {
            transcript.push_str(&line);
            transcript.push('\n');
            let reply: &[u8] = if in_data {
                if line != "." {
                    continue;
                }
                in_data = false;
                b"250 queued\r\n"
            } else if line.starts_with("EHLO") {
                b"250 smtp.test\r\n"
            } else if line.starts_with("DATA") {
                in_data = true;
                b"354 end data with <CR><LF>.<CR><LF>\r\n"
            } else if line.starts_with("QUIT") {
                write.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                b"250 ok\r\n"
            };
            write.write_all(reply).await.unwrap();
        }
        transcript
    });
    (port, handle)
}

#[tokio::test]
async fn test_smtp_mail_sender_delivers_message() {
    // --- 1. Arrange ---
    setup_tracing();
    let (port, server) = smtp_server().await;
    let sender = SmtpMailSender::new("127.0.0.1", port, SmtpTls::None, None).unwrap();

    // --- 2. Act ---
    let result = sender.send(&message()).await;

    // --- 3. Assert ---
    assert!(result.is_ok(), "send failed: {result:?}");
    let transcript = server.await.unwrap();
    assert!(transcript.contains("MAIL FROM:<alerts@jobwatch.test>"));
    assert!(transcript.contains("RCPT TO:<me@example.com>"));
    assert!(transcript.contains("Subject: New job listings from jobs.test!"));
    assert!(transcript.contains("Link: https://jobs.test/1"));
    assert!(sender.delivers());
}

#[tokio::test]
async fn test_smtp_mail_sender_rejects_bad_address() {
    let sender = SmtpMailSender::new("127.0.0.1", 2525, SmtpTls::None, None).unwrap();
    let mut bad = message();
    bad.to = "not an address".to_string();

    let result = sender.send(&bad).await;

    assert!(matches!(result, Err(SendError::InvalidAddress { .. })));
}

#[tokio::test]
async fn test_fs_blob_store_round_trip() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let store = FsBlobStore::new(dir.path());

    // --- 2. Act ---
    let before = store.get("bucket", "known.json").await.unwrap();
    store
        .put("bucket", "known.json", b"first".to_vec())
        .await
        .unwrap();
    store
        .put("bucket", "known.json", b"second".to_vec())
        .await
        .unwrap();
    let after = store.get("bucket", "known.json").await.unwrap();

    // --- 3. Assert ---
    assert_eq!(before, StoreLookup::NotFound);
    assert_eq!(after, StoreLookup::Found(b"second".to_vec()));
    let entries: Vec<_> = std::fs::read_dir(dir.path().join("bucket"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["known.json".to_string()], "no staging file left behind");
}

#[tokio::test]
async fn test_fs_blob_store_rejects_path_traversal() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let store = FsBlobStore::new(dir.path().join("store"));

    // --- 2. Act ---
    let read = store.get("..", "secrets.json").await;
    let write = store.put("bucket", "../escape.json", b"{}".to_vec()).await;

    // --- 3. Assert ---
    assert!(matches!(read, Err(StoreError::InvalidLocation { .. })));
    assert!(matches!(write, Err(StoreError::InvalidLocation { .. })));
    assert!(!dir.path().join("escape.json").exists());
}
