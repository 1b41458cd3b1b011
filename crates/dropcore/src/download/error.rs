use std::fmt;

use crate::core::process::ProcessError;

/// Categorized failure of a download attempt.
///
/// Every variant is terminal for the job; retries happen inside yt-dlp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// yt-dlp ran and reported an error
    YtDlp(String),
    /// yt-dlp reported success but no output file could be found
    FileNotFound(String),
    /// Download exceeded its time budget
    Timeout(String),
    /// yt-dlp could not be started or waited on
    Process(String),
    /// URL or format rejected before anything was started
    InvalidUrl(String),
    /// Catch-all for uncategorized errors
    Other(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for DownloadError {}

impl DownloadError {
    /// Short machine-readable category, used in logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::YtDlp(_) => "ytdlp",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Timeout(_) => "timeout",
            DownloadError::Process(_) => "process",
            DownloadError::InvalidUrl(_) => "invalid_url",
            DownloadError::Other(_) => "other",
        }
    }

    /// Returns the inner message
    pub fn message(&self) -> &str {
        match self {
            DownloadError::YtDlp(msg)
            | DownloadError::FileNotFound(msg)
            | DownloadError::Timeout(msg)
            | DownloadError::Process(msg)
            | DownloadError::InvalidUrl(msg)
            | DownloadError::Other(msg) => msg,
        }
    }
}

impl From<ProcessError> for DownloadError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { .. } => DownloadError::Timeout(err.to_string()),
            ProcessError::Failed { ref stderr, .. } => {
                let line = last_error_line(stderr).unwrap_or_else(|| err.to_string());
                DownloadError::YtDlp(line)
            }
            ProcessError::Spawn { .. } => DownloadError::Process(err.to_string()),
        }
    }
}

/// The last `ERROR:` line yt-dlp printed, which is the one worth showing.
pub fn last_error_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
        .map(str::to_string)
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        DownloadError::Other(s.to_string())
    }
}
