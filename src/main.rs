//! barscan demo binary.
//!
//! Runs the full pipeline against the synthetic camera: acquires the
//! simulated device, spawns the decode worker and the scan loop, logs
//! status transitions, and exits once the rendered payload is recognized.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use barscan::config::ScannerConfig;
use barscan::decode::{ean13, Ean13Engine};
use barscan::session::{LifecycleState, ScanSession};
use barscan::source::synthetic::SyntheticCamera;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "barscan")]
#[command(about = "Camera barcode scanning pipeline demo")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// EAN-13 payload rendered by the synthetic camera
    #[arg(long, default_value = "4607004345302")]
    payload: String,

    /// Give up after this many seconds without a recognition
    #[arg(long, default_value_t = 15)]
    max_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ScannerConfig::load_from(path)?,
        None => ScannerConfig::load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "barscan={}",
                    config.application.log_level
                ))
            }),
        )
        .init();

    info!("Starting {}", config.application.name);

    if !ean13::is_valid_code(&cli.payload) {
        bail!("'{}' is not a valid EAN-13 code", cli.payload);
    }

    // Size the simulated sensor to satisfy the configured constraint.
    let width = config.capture.min_width.max(640);
    let height = width * 9 / 16;
    let camera = SyntheticCamera::new(width, height)
        .with_payload(cli.payload.as_str())
        .with_warmup_frames(3);

    let (result_tx, mut result_rx) = tokio::sync::mpsc::unbounded_channel();
    let on_result = Box::new(move |payload: String| {
        let _ = result_tx.send(payload);
    });

    let mut session = ScanSession::start(
        &config,
        Box::new(camera),
        Arc::new(Ean13Engine::new()),
        on_result,
    )
    .await;

    if session.state() != LifecycleState::Running {
        bail!("Session failed to start: {}", session.status().message);
    }

    let mut status_rx = session.subscribe();
    let _printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            info!(
                "[{}] {} (ready: {}, mean latency {:.1} ms)",
                status.state, status.message, status.ready, status.mean_latency_ms
            );
        }
    });

    let outcome = tokio::select! {
        payload = result_rx.recv() => payload,
        _ = tokio::time::sleep(Duration::from_secs(cli.max_seconds)) => None,
    };

    let mean_latency_ms = session.status().mean_latency_ms;
    session
        .stop()
        .await
        .context("Session teardown reported errors")?;

    match outcome {
        Some(payload) => {
            info!(
                "Decoded payload {} (mean decode latency {:.1} ms)",
                payload, mean_latency_ms
            );
            println!("{payload}");
            Ok(())
        }
        None => bail!("No recognition within {} seconds", cli.max_seconds),
    }
}
