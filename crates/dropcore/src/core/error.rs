use thiserror::Error;

use crate::core::process::ProcessError;
use crate::download::DownloadError;
use crate::pipeline::TransportError;

/// Centralized error type for the core library
///
/// Component errors convert into this enum with `?`. Pipeline stages that
/// need the user-facing taxonomy use [`crate::pipeline::PipelineError`]
/// instead and only fall back to `AppError` for store and setup failures.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(String),

    /// Download/yt-dlp errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// ffmpeg/ffprobe/yt-dlp process errors
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Chat transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings could not be assembled
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blocking task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_source_message() {
        let err = AppError::Validation("url is empty".to_string());
        assert_eq!(err.to_string(), "Validation error: url is empty");

        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("IO error:"));
    }

    #[test]
    fn download_error_converts() {
        let err: AppError = DownloadError::FileNotFound("abc".to_string()).into();
        assert!(matches!(err, AppError::Download(DownloadError::FileNotFound(_))));
    }
}
