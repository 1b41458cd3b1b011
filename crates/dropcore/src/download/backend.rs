//! The seam between the orchestrator and the external downloader.

use std::path::{Path, PathBuf};

use crate::download::DownloadError;

/// One download: `url` in format `format_id`, written under `download_dir`
/// with a file name that starts with `job_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub job_id: String,
    pub url: String,
    pub format_id: String,
    pub download_dir: PathBuf,
}

impl FetchRequest {
    /// yt-dlp output template; the job id prefix is what fallback discovery scans for.
    pub fn output_template(&self) -> PathBuf {
        self.download_dir.join(format!("{}.%(ext)s", self.job_id))
    }

    pub fn file_prefix(&self) -> &str {
        &self.job_id
    }
}

/// What the downloader reported. Any field may be missing even on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    pub file_path: Option<PathBuf>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
}

/// A selectable format from the remote listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOption {
    pub format_id: String,
    pub resolution: String,
    pub ext: String,
    pub filesize: Option<u64>,
}

/// Remote metadata shown before the user picks a format.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMedia {
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub formats: Vec<FormatOption>,
}

/// External downloader. Both calls block and must run off the async runtime.
pub trait DownloadBackend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Downloads into the request's output template. Retries are the tool's business.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchReport, DownloadError>;

    /// Title, uploader, duration and the format list, without downloading.
    fn describe(&self, url: &str) -> Result<RemoteMedia, DownloadError>;
}

/// Whether `name` is a finished download belonging to `prefix`.
pub(crate) fn matches_prefix(name: &str, prefix: &str) -> bool {
    const PARTIAL: [&str; 3] = [".part", ".ytdl", ".temp"];
    name.starts_with(prefix) && !PARTIAL.iter().any(|ext| name.ends_with(ext))
}

pub(crate) fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
