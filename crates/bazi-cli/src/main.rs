//! bazi - a line-oriented shell for the bazi chart service.
//!
//! Calculates four-pillar charts for a birth date and, once logged in, saves
//! and lists them.

mod app;
mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use bazi_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Log file name inside the cache directory
const LOG_FILE: &str = "bazi.log";

/// Initialize the tracing subscriber.
/// Logs go to a file so they never interleave with the shell's output.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));

    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=bazi_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing(&Config::cache_dir()?)?;

    let mut config = Config::load_or_default();
    config.apply_env();
    info!(api = %config.api_base_url, backend = ?config.credential_backend, "bazi starting");

    let mut app = App::new(config)?;
    app.run().await?;

    info!("bazi shutting down");
    Ok(())
}
