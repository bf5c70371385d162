use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mayfly_forms::admission::{AdmissionGate, AdmissionResponse, SubmissionMeta};
use mayfly_forms::config::{LoggingConfig, MayflyConfig};
use mayfly_forms::ratelimit::{RateLimiter, Sweeper, SystemClock};

/// Admission gate for form submissions.
///
/// Reads one JSON submission record per line on stdin and writes one JSON
/// admission decision per line on stdout.
#[derive(Parser, Debug)]
#[command(name = "mayfly-forms", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = MayflyConfig::load(args.config.as_deref())?;
    if args.json_logs {
        config.logging.json = true;
    }
    init_tracing(&config.logging);

    info!("Starting Mayfly Forms admission gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        cleanup_interval_secs = config.rate_limiting.cleanup_interval_secs,
        cleanup_max_age_secs = config.rate_limiting.cleanup_max_age_secs,
        "Configuration loaded"
    );

    let limiter = Arc::new(RateLimiter::new());
    info!("Rate limiter initialized");

    let sweeper = Sweeper::spawn(
        Arc::clone(&limiter),
        config.rate_limiting.cleanup_interval(),
        config.rate_limiting.cleanup_max_age(),
    );

    let gate = AdmissionGate::new(Arc::clone(&limiter));

    tokio::select! {
        result = serve_lines(&gate) => {
            result?;
            info!("Input closed");
        }
        _ = shutdown_signal() => {}
    }

    sweeper.shutdown().await;
    info!(clients = limiter.client_count(), "Mayfly Forms admission gate stopped");
    Ok(())
}

/// Initialize tracing. `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // stdout carries decisions, so logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve_lines(gate: &AdmissionGate<SystemClock>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<SubmissionMeta>(&line) {
            Ok(meta) => gate.admit(&meta),
            Err(e) => {
                warn!(error = %e, "Discarding malformed submission record");
                AdmissionResponse::bad_request("Invalid submission record")
            }
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
