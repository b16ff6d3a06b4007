//! # Collaborator Factory
//!
//! Builds the fetcher, store and mail sender for one run from the application
//! configuration. Placing this in the `lib` crate lets the CLI and the server
//! share the same wiring.

use super::{
    Collaborators, FsBlobStore, HttpBlobStore, HttpMailSender, HttpPageFetcher, LogMailSender,
    S3BlobStore, SmtpMailSender,
};
use crate::{
    config::{AppConfig, MailTransport, StoreBackend},
    errors::{ConfigError, RunError},
    types::RunRequest,
};
use std::time::Duration;
use tracing::{info, warn};

pub async fn build_collaborators(
    config: &AppConfig,
    request: &RunRequest,
) -> Result<Collaborators, RunError> {
    let fetcher = HttpPageFetcher::new(
        Duration::from_secs(config.fetch.timeout_secs),
        &config.fetch.user_agent,
    )
    .map_err(|e| RunError::Setup(e.to_string()))?;

    let store: Box<dyn super::BlobStore> = match config.store.backend {
        StoreBackend::Fs => Box::new(FsBlobStore::new(&config.store.root)),
        StoreBackend::Http => {
            let base_url = config
                .store
                .base_url
                .clone()
                .ok_or(ConfigError::Missing("store.base_url"))?;
            let token = config
                .store
                .token_ref
                .as_deref()
                .map(|reference| config.resolve_credential(reference))
                .transpose()?;
            Box::new(
                HttpBlobStore::new(base_url, token).map_err(|e| RunError::Setup(e.to_string()))?,
            )
        }
        StoreBackend::S3 => Box::new(
            S3BlobStore::from_env(
                config.store.region.clone(),
                config.store.endpoint_url.clone(),
            )
            .await,
        ),
    };

    let secret = request
        .credential_ref
        .as_deref()
        .map(|reference| config.resolve_credential(reference))
        .transpose()?;

    let mailer: Box<dyn super::MailSender> = match config.mail.transport {
        MailTransport::Log => {
            warn!("Mail transport is 'log': this run is a dry run.");
            Box::new(LogMailSender)
        }
        MailTransport::Http => {
            let api_url = config
                .mail
                .api_url
                .clone()
                .ok_or(ConfigError::Missing("mail.api_url"))?;
            Box::new(
                HttpMailSender::new(api_url, secret).map_err(|e| RunError::Setup(e.to_string()))?,
            )
        }
        MailTransport::Smtp => {
            let smtp = &config.mail.smtp;
            let host = smtp
                .host
                .as_deref()
                .ok_or(ConfigError::Missing("mail.smtp.host"))?;
            // The login defaults to the sender address, like the digest's From.
            let credentials = secret.map(|password| {
                let username = smtp
                    .username
                    .clone()
                    .or_else(|| config.mail.from_address.clone())
                    .unwrap_or_else(|| request.recipient.clone());
                (username, password)
            });
            Box::new(
                SmtpMailSender::new(host, smtp.port, smtp.tls, credentials)
                    .map_err(|e| RunError::Setup(e.to_string()))?,
            )
        }
    };

    info!(
        "Collaborators ready: store backend '{}', mail transport {:?}.",
        store.name(),
        config.mail.transport
    );

    Ok(Collaborators {
        fetcher: Box::new(fetcher),
        store,
        mailer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpTls;

    fn request(credential_ref: Option<&str>) -> RunRequest {
        RunRequest {
            url: "https://jobs.test/remote".to_string(),
            store_key: "processed.json".to_string(),
            recipient: "me@example.com".to_string(),
            credential_ref: credential_ref.map(str::to_string),
            patterns: vec!["remote".to_string()],
            namespace: "bucket".to_string(),
        }
    }

    #[tokio::test]
    async fn test_defaults_require_a_mail_relay() {
        let result = build_collaborators(&AppConfig::default(), &request(None)).await;
        assert!(matches!(
            result,
            Err(RunError::Config(ConfigError::Missing("mail.api_url")))
        ));
    }

    #[tokio::test]
    async fn test_http_relay_delivers() {
        let mut config = AppConfig::default();
        config.mail.api_url = Some("http://localhost/send".to_string());

        let collaborators = build_collaborators(&config, &request(None)).await.unwrap();

        assert_eq!(collaborators.store.name(), "filesystem");
        assert!(collaborators.mailer.delivers());
    }

    #[tokio::test]
    async fn test_log_transport_is_a_dry_run() {
        let mut config = AppConfig::default();
        config.mail.transport = MailTransport::Log;

        let collaborators = build_collaborators(&config, &request(None)).await.unwrap();

        assert!(!collaborators.mailer.delivers());
    }

    #[tokio::test]
    async fn test_smtp_requires_host() {
        let mut config = AppConfig::default();
        config.mail.transport = MailTransport::Smtp;
        let result = build_collaborators(&config, &request(None)).await;
        assert!(matches!(
            result,
            Err(RunError::Config(ConfigError::Missing("mail.smtp.host")))
        ));
    }

    #[tokio::test]
    async fn test_smtp_with_credential_builds_a_delivering_sender() {
        let mut config = AppConfig::default();
        config.mail.transport = MailTransport::Smtp;
        config.mail.smtp.host = Some("smtp.jobwatch.test".to_string());
        config.mail.smtp.port = 2525;
        config.mail.smtp.tls = SmtpTls::Starttls;
        config
            .credentials
            .insert("GMAIL_APP_PASSWORD".to_string(), "app-password".to_string());

        let collaborators = build_collaborators(&config, &request(Some("GMAIL_APP_PASSWORD")))
            .await
            .unwrap();

        assert!(collaborators.mailer.delivers());
        assert!(format!("{:?}", collaborators.mailer).contains("smtp.jobwatch.test:2525"));
    }

    #[tokio::test]
    async fn test_unresolvable_credential_fails() {
        let mut config = AppConfig::default();
        config.mail.api_url = Some("http://localhost/send".to_string());
        let result =
            build_collaborators(&config, &request(Some("JOBWATCH_TEST_NO_SUCH_SECRET"))).await;
        assert!(matches!(
            result,
            Err(RunError::Config(ConfigError::MissingCredential(_)))
        ));
    }
}
