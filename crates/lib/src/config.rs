//! # Application Configuration
//!
//! This module defines the configuration shared by the `jobwatch` binaries and
//! the logic for loading it in layers:
//!
//! 1. Serde defaults.
//! 2. An optional YAML file (`jobwatch.yml` unless a path is given), with
//!    `${VAR}` placeholders substituted from the environment.
//! 3. `JOBWATCH_` prefixed environment variables, using `__` for nesting
//!    (e.g., `JOBWATCH_FETCH__TIMEOUT_SECS=5`).

use crate::errors::ConfigError;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use jobwatch_html::ListingSelectors;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;

/// The file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "jobwatch.yml";

/// The root configuration structure, mapping directly to `jobwatch.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the HTTP trigger to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    /// Named secrets. A request's `credential_ref` is looked up here first,
    /// then in the environment.
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            fetch: FetchConfig::default(),
            store: StoreConfig::default(),
            mail: MailConfig::default(),
            selectors: SelectorConfig::default(),
            credentials: HashMap::new(),
        }
    }
}

fn default_port() -> u16 {
    9090
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Upper bound for the whole page request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    concat!("jobwatch/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Fs,
    Http,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory of the filesystem backend.
    #[serde(default = "default_store_root")]
    pub root: String,
    /// Object endpoint of the http backend.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Credential name for the http backend's bearer token.
    #[serde(default)]
    pub token_ref: Option<String>,
    /// Region of the s3 backend. The AWS environment decides when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint of the s3 backend (MinIO, LocalStack). Implies
    /// path-style addressing.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            root: default_store_root(),
            base_url: None,
            token_ref: None,
            region: None,
            endpoint_url: None,
        }
    }
}

fn default_store_root() -> String {
    "db/store".to_string()
}

/// How digests leave the process. Only `log` never delivers; it must be
/// chosen explicitly and turns every run into a dry run.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    #[default]
    Http,
    Smtp,
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    #[serde(default)]
    pub transport: MailTransport,
    /// Endpoint of the http mail relay.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Sender address. Defaults to the recipient, so digests go to oneself.
    #[serde(default)]
    pub from_address: Option<String>,
    /// Digest subject; `{host}` is replaced by the page host.
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            api_url: None,
            smtp: SmtpConfig::default(),
            from_address: None,
            subject: default_subject(),
        }
    }
}

fn default_subject() -> String {
    "New job listings from {host}!".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587).
    #[default]
    Starttls,
    /// TLS from the first byte (port 465).
    Wrapper,
    /// No encryption. Only for local relays and tests.
    None,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: SmtpTls,
    /// Login name. Defaults to the sender address.
    #[serde(default)]
    pub username: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            tls: SmtpTls::default(),
            username: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Listing selectors, see `jobwatch_html::ListingSelectors`.
#[derive(Debug, Deserialize, Clone)]
pub struct SelectorConfig {
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_marker_selector")]
    pub marker: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: default_title_selector(),
            marker: default_marker_selector(),
        }
    }
}

fn default_title_selector() -> String {
    ListingSelectors::default().title
}

fn default_marker_selector() -> String {
    ListingSelectors::default().marker
}

impl From<&SelectorConfig> for ListingSelectors {
    fn from(config: &SelectorConfig) -> Self {
        Self {
            title: config.title.clone(),
            marker: config.marker.clone(),
        }
    }
}

impl AppConfig {
    /// Resolves a credential name to its secret.
    ///
    /// Looks in `credentials` (exact, then lowercase since environment
    /// overrides arrive lowercased), then in the environment variable of the
    /// same name.
    pub fn resolve_credential(&self, reference: &str) -> Result<String, ConfigError> {
        self.credentials
            .get(reference)
            .or_else(|| self.credentials.get(&reference.to_ascii_lowercase()))
            .cloned()
            .or_else(|| env::var(reference).ok())
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(reference.to_string()))
    }
}

// Reads a file and substitutes `${VAR}` placeholders from the environment.
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration.
///
/// A missing default file is fine; a missing file given explicitly is an error.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let config_path = config_path_override.unwrap_or(DEFAULT_CONFIG_FILE);
    match read_and_substitute(config_path)? {
        Some(content) => {
            info!("Loading configuration from '{config_path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path_override.is_some() => {
            return Err(ConfigError::NotFound(format!(
                "Config file not found at '{config_path}'."
            )));
        }
        None => {
            info!("'{config_path}' not found. Using defaults and environment.");
        }
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("JOBWATCH")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
