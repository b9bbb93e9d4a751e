// ============================================================================
// File: src/main.rs
// Entry point and CLI handling
// ============================================================================

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

use paperchat::config::Config;
use paperchat::credentials::CredentialStore;
use paperchat::repl::Repl;
use paperchat::telemetry;

/// Command-line arguments for the paper search and chat terminal
#[derive(Parser, Debug)]
#[command(name = "paperchat")]
#[command(about = "Search arXiv and chat about papers with an LLM", long_about = None)]
struct Args {
    /// Path to a JSON configuration file (defaults to ./paperchat.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path of the credential file holding the chat API key
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Enable verbose output (debug logging to stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    telemetry::init(args.verbose);

    // Load and validate configuration
    let config = Config::load_or_default(args.config.as_deref(), Path::new("paperchat.json"))?;
    config.validate()?;

    let credentials = args
        .credentials
        .or_else(CredentialStore::default_path)
        .map(CredentialStore::new);
    if let Some(store) = &credentials {
        debug!(path = %store.path().display(), "using credential file");
    }

    Repl::new(config, credentials)?.run().await
}
