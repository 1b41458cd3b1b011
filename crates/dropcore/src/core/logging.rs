//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (stderr + optional file) on top of `tracing-subscriber`,
//!   with the `log` facade bridged in so `log::info!` and friends are captured
//! - A startup summary of the external tools and directories in use

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Initialize the global logger
///
/// The filter comes from `RUST_LOG` and defaults to `info`. When
/// `log_file_path` is given, records are also appended (without ANSI colors)
/// to that file; its parent directory is created if needed.
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - The file could not be opened, or a logger is already installed
pub fn init_logger(log_file_path: Option<&Path>) -> Result<()> {
    let file_layer = match log_file_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber).context("Failed to initialize logger")?;
    tracing_log::LogTracer::init().context("Failed to bridge the log facade")?;

    Ok(())
}

/// Logs the external tool configuration at application startup
pub fn log_tool_configuration(settings: &Settings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🔧 Tool configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("yt-dlp:   {}", settings.ytdlp_bin);
    log::info!("ffmpeg:   {}", settings.ffmpeg_bin);
    log::info!("ffprobe:  {}", settings.ffprobe_bin);
    log::info!("database: {}", settings.database_path.display());

    let dir = &settings.download_dir;
    if dir.is_dir() {
        log::info!("✅ download dir: {}", dir.display());
    } else {
        log::warn!("⚠️  download dir {} does not exist yet, it will be created on first job", dir.display());
    }
    log::info!(
        "limits: part size {} bytes, {} free tasks/day, thumbnails: {}",
        settings.max_file_size,
        settings.daily_task_limit,
        settings.thumbnail_strategy
    );
}
