use crate::{config::SmtpTls, errors::SendError};
use async_trait::async_trait;
use dyn_clone::DynClone;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use std::fmt::Debug;
use tracing::info;

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(rename = "text")]
    pub body: String,
}

/// Delivers a message to its recipient.
#[async_trait]
pub trait MailSender: Send + Sync + Debug + DynClone {
    async fn send(&self, message: &MailMessage) -> Result<(), SendError>;

    /// Whether a successful `send` means the message left the process.
    /// Runs with a non-delivering sender are dry runs and persist nothing.
    fn delivers(&self) -> bool {
        true
    }
}

dyn_clone::clone_trait_object!(MailSender);

/// Posts messages as JSON to an HTTP mail relay.
///
/// The body is `{"from", "to", "subject", "text"}`; the resolved credential is
/// sent as a bearer token.
#[derive(Clone, Debug)]
pub struct HttpMailSender {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
}

impl HttpMailSender {
    pub fn new(api_url: String, api_key: Option<String>) -> Result<Self, SendError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(SendError::ClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), SendError> {
        let mut request_builder = self.client.post(&self.api_url);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder.json(message).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected { status, body });
        }

        info!("Email sent to {}", message.to);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them. Used for dry runs.
#[derive(Clone, Debug, Default)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), SendError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "Mail transport is 'log', not delivering:\n{}",
            message.body
        );
        Ok(())
    }

    fn delivers(&self) -> bool {
        false
    }
}

/// Delivers messages over SMTP, by default with STARTTLS and a login as the
/// sender.
#[derive(Clone, Debug)]
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailSender {
    /// `credentials` is `(username, password)`; `None` sends without login.
    pub fn new(
        host: &str,
        port: u16,
        tls: SmtpTls,
        credentials: Option<(String, String)>,
    ) -> Result<Self, SendError> {
        let mut builder = match tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            host: format!("{host}:{port}"),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

fn mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| SendError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), SendError> {
        let email = Message::builder()
            .from(mailbox(&message.from)?)
            .to(mailbox(&message.to)?)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())?;

        self.transport.send(email).await?;
        info!("Email sent to {} via {}", message.to, self.host);
        Ok(())
    }
}
