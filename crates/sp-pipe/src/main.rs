//! spipe: secure pipe client
//!
//! Connects to a secure endpoint and relays standard input to it and its
//! replies to standard output.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sp_core::config::PipeConfig;
use sp_core::io::StdioStream;
use sp_core::secure::SecureConnector;
use sp_core::ConfigError;
use sp_transport::SharedKey;

#[derive(Parser)]
#[command(name = "spipe")]
#[command(about = "Secure pipe client: relay stdin/stdout over an encrypted connection")]
#[command(version)]
struct Args {
    /// Secure endpoint to connect to
    #[arg(short, long)]
    target: Option<String>,

    /// Shared key file
    #[arg(short, long)]
    key_file: Option<PathBuf>,

    /// Per-operation inactivity timeout in seconds, 0 to disable
    #[arg(short = 'o', long, default_value_t = 0)]
    timeout: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // stdout carries relayed data, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(args));

    // A blocked stdin read would otherwise hold up runtime shutdown
    runtime.shutdown_background();

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = PipeConfig::new(
        args.target.unwrap_or_default(),
        args.key_file.unwrap_or_default(),
    );
    config.timeout = Duration::from_secs(args.timeout);

    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::MissingField(_)) => {
            eprintln!("{}", Args::command().render_help());
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e).context("Invalid configuration"),
    }

    let key = SharedKey::load(&config.key_file)
        .with_context(|| format!("Failed to load key from {:?}", config.key_file))?;
    let connector = SecureConnector::new(
        key,
        config.target_address.clone(),
        config.transport_options(),
    );

    let report = sp_pipe::run_pipe(StdioStream::new(), &connector, config.deadline())
        .await
        .with_context(|| format!("Failed to connect to {}", config.target_address))?;

    if sp_pipe::log_errors(&report) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
