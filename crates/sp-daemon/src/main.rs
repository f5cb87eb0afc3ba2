//! spiped: secure pipe daemon
//!
//! Accepts secure connections on the source address and forwards each one
//! to the target address over a new secure stream.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sp_core::config::{self, DaemonConfig};
use sp_core::secure::SecureConnector;
use sp_core::ConfigError;
use sp_daemon::{AdmissionController, ProxyServer};
use sp_transport::{SecureListener, SharedKey};

#[derive(Parser)]
#[command(name = "spiped")]
#[command(about = "Secure pipe daemon: accept secure connections and forward them to a target")]
#[command(version)]
struct Args {
    /// Address to accept secure connections on
    #[arg(short, long)]
    source: Option<String>,

    /// Secure endpoint to forward connections to
    #[arg(short, long)]
    target: Option<String>,

    /// Shared key file
    #[arg(short, long)]
    key_file: Option<PathBuf>,

    /// Maximum number of concurrently forwarded connections [default: 100]
    #[arg(short = 'n', long)]
    max_connections: Option<usize>,

    /// Per-operation inactivity timeout in seconds, 0 to disable [default: 0]
    #[arg(short = 'o', long)]
    timeout: Option<u64>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Layer command-line values over the configuration file
    fn apply(self, config: &mut DaemonConfig) {
        if let Some(source) = self.source {
            config.source_address = source;
        }
        if let Some(target) = self.target {
            config.target_address = target;
        }
        if let Some(key_file) = self.key_file {
            config.key_file = key_file;
        }
        if let Some(max_connections) = self.max_connections {
            config.max_connections = max_connections;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => DaemonConfig::default(),
    };
    args.apply(&mut config);

    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::MissingField(_)) => {
            eprintln!("{}", Args::command().render_help());
            return Ok(());
        }
        Err(e) => return Err(e).context("Invalid configuration"),
    }

    let capacity = NonZeroUsize::new(config.max_connections)
        .context("max connections must be at least 1")?;

    let key = SharedKey::load(&config.key_file)
        .with_context(|| format!("Failed to load key from {:?}", config.key_file))?;

    let listener = SecureListener::bind(
        key.clone(),
        config.source_address.as_str(),
        config.transport_options(),
    )
    .await
    .with_context(|| format!("Failed to listen on {}", config.source_address))?;

    let connector = SecureConnector::new(
        key,
        config.target_address.clone(),
        config.transport_options(),
    );

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let server = ProxyServer::new(
        listener,
        connector,
        AdmissionController::new(capacity),
        config.deadline(),
        cancel,
    );
    server.run().await;

    tracing::info!("spiped shutdown complete");
    Ok(())
}
