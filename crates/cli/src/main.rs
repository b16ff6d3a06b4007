//! # jobwatch: the command-line trigger
//!
//! Runs the pipeline once and prints the `RunResult` as JSON on stdout. Logs go
//! to stderr so the output can be piped. The exit code is 0 when the run
//! notified or had nothing to do, and 1 when it failed.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jobwatch::{execute_run, get_config, RunRequest};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file. Defaults to `jobwatch.yml` if present.
    #[arg(long, global = true, env = "JOBWATCH_CONFIG_FILE")]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a listings page once and notify about new matches
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// A JSON trigger event holding the whole request
    #[arg(
        long,
        conflicts_with_all = ["url", "store_key", "recipient", "patterns", "namespace", "credential_ref"]
    )]
    event: Option<PathBuf>,
    /// The page of job postings to check
    #[arg(long, required_unless_present = "event")]
    url: Option<String>,
    /// Key of the known-listings object
    #[arg(long, required_unless_present = "event")]
    store_key: Option<String>,
    /// Who receives the digest
    #[arg(long, required_unless_present = "event")]
    recipient: Option<String>,
    /// A literal, case-sensitive pattern; repeat for more
    #[arg(long = "pattern", required_unless_present = "event")]
    patterns: Vec<String>,
    /// Bucket of the known-listings object
    #[arg(long, required_unless_present = "event")]
    namespace: Option<String>,
    /// Name of the mail credential in the configuration or environment
    #[arg(long)]
    credential_ref: Option<String>,
}

impl RunArgs {
    fn into_request(self) -> Result<RunRequest> {
        if let Some(path) = self.event {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read event file '{}'", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Invalid event in '{}'", path.display()));
        }

        Ok(RunRequest {
            url: self.url.unwrap_or_default(),
            store_key: self.store_key.unwrap_or_default(),
            recipient: self.recipient.unwrap_or_default(),
            credential_ref: self.credential_ref,
            patterns: self.patterns,
            namespace: self.namespace.unwrap_or_default(),
        })
    }
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = get_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            let request = args.into_request()?;
            info!("Starting run for {}", request.url);

            let result = execute_run(&config, &request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            Ok(if result.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
