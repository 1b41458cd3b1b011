//! Cancellable download of one job's source file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::download::backend::{file_name, matches_prefix, DownloadBackend, FetchRequest, RemoteMedia};
use crate::download::DownloadError;
use crate::media::split::discard;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_UPLOADER: &str = "Unknown Uploader";

/// A finished download on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedMedia {
    pub file_path: PathBuf,
    pub title: String,
    pub uploader: String,
    pub duration: Option<f64>,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Completed(DownloadedMedia),
    Cancelled,
    Failed(DownloadError),
}

pub struct DownloadOrchestrator {
    backend: Arc<dyn DownloadBackend>,
    download_dir: PathBuf,
}

impl DownloadOrchestrator {
    pub fn new(backend: Arc<dyn DownloadBackend>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Downloads `url` for `job_id`.
    ///
    /// The token is checked before the backend starts and again right after
    /// it returns; the blocking call itself is never interrupted. When the
    /// token is set at the second check, whatever the backend wrote is
    /// deleted and the outcome is `Cancelled` even if the download succeeded.
    pub async fn download(
        &self,
        job_id: &str,
        url: &str,
        format_id: &str,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        if cancel.is_cancelled() {
            log::info!("[DOWNLOAD] job {} cancelled before start", job_id);
            return DownloadOutcome::Cancelled;
        }

        if let Err(e) = fs_err::tokio::create_dir_all(&self.download_dir).await {
            return DownloadOutcome::Failed(DownloadError::Other(format!(
                "cannot create download directory: {}",
                e
            )));
        }

        let request = FetchRequest {
            job_id: job_id.to_string(),
            url: url.to_string(),
            format_id: format_id.to_string(),
            download_dir: self.download_dir.clone(),
        };
        let backend = Arc::clone(&self.backend);
        let blocking_request = request.clone();
        let result = tokio::task::spawn_blocking(move || backend.fetch(&blocking_request)).await;

        if cancel.is_cancelled() {
            log::info!("[DOWNLOAD] job {} cancelled during download, discarding output", job_id);
            self.discard_job_files(&request).await;
            return DownloadOutcome::Cancelled;
        }

        let report = match result {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                log::error!("[DOWNLOAD] {} failed ({}): {}", job_id, e.subcategory(), e);
                self.discard_job_files(&request).await;
                return DownloadOutcome::Failed(e);
            }
            Err(e) => {
                log::error!("[DOWNLOAD] {} download task died: {}", job_id, e);
                self.discard_job_files(&request).await;
                return DownloadOutcome::Failed(DownloadError::Other(format!("download task failed: {}", e)));
            }
        };

        let reported = report.file_path.clone().filter(|p| p.is_file());
        let file_path = match reported {
            Some(path) => path,
            None => {
                if let Some(p) = &report.file_path {
                    log::warn!("[DOWNLOAD] reported path {} does not exist, scanning", p.display());
                } else {
                    log::warn!("[DOWNLOAD] {} returned no file path, scanning", self.backend.name());
                }
                match largest(find_job_files(&self.download_dir, request.file_prefix(), false).await).await {
                    Some(path) => {
                        log::info!("[DOWNLOAD] found {} by prefix", path.display());
                        path
                    }
                    None => {
                        return DownloadOutcome::Failed(DownloadError::FileNotFound(
                            "File not found after download".to_string(),
                        ))
                    }
                }
            }
        };

        DownloadOutcome::Completed(DownloadedMedia {
            file_path,
            title: report.title.filter(|t| !t.is_empty()).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            uploader: report
                .uploader
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string()),
            duration: report.duration,
        })
    }

    /// Removes everything the backend wrote for `request`, partial files included.
    async fn discard_job_files(&self, request: &FetchRequest) {
        for path in find_job_files(&self.download_dir, request.file_prefix(), true).await {
            discard(&path).await;
        }
    }

    /// Remote title and formats, fetched on the blocking pool.
    pub async fn describe(&self, url: &str) -> Result<RemoteMedia, DownloadError> {
        let backend = Arc::clone(&self.backend);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || backend.describe(&url))
            .await
            .map_err(|e| DownloadError::Other(format!("describe task failed: {}", e)))?
    }
}

/// Files in `dir` whose name starts with `prefix`. Partial downloads are
/// skipped unless `include_partial` is set.
async fn find_job_files(dir: &Path, prefix: &str, include_partial: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut entries = match fs_err::tokio::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("[DOWNLOAD] cannot scan {}: {}", dir.display(), e);
            return found;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(name) = file_name(&path) else {
            continue;
        };
        let wanted = if include_partial {
            name.starts_with(prefix)
        } else {
            matches_prefix(name, prefix)
        };
        if wanted && path.is_file() {
            found.push(path);
        }
    }
    found
}

async fn largest(paths: Vec<PathBuf>) -> Option<PathBuf> {
    let mut best: Option<(PathBuf, u64)> = None;
    for path in paths {
        let len = fs_err::tokio::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if best.as_ref().map_or(true, |(_, l)| len > *l) {
            best = Some((path, len));
        }
    }
    best.map(|(p, _)| p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::backend::FetchReport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
        write: Option<&'static str>,
        report_path: bool,
    }

    impl DownloadBackend for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn fetch(&self, request: &FetchRequest) -> Result<FetchReport, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(ext) = self.write else {
                return Err(DownloadError::YtDlp("ERROR: Video unavailable".into()));
            };
            let path = request.download_dir.join(format!("{}.{}", request.job_id, ext));
            std::fs::write(&path, b"data").map_err(|e| DownloadError::Other(e.to_string()))?;
            Ok(FetchReport {
                file_path: self.report_path.then_some(path),
                title: Some("Clip".into()),
                uploader: None,
                duration: Some(3.0),
            })
        }

        fn describe(&self, _url: &str) -> Result<RemoteMedia, DownloadError> {
            Err("unsupported".into())
        }
    }

    fn orchestrator(dir: &Path, write: Option<&'static str>, report_path: bool) -> (DownloadOrchestrator, Arc<Scripted>) {
        let backend = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            write,
            report_path,
        });
        (DownloadOrchestrator::new(backend.clone(), dir), backend)
    }

    #[tokio::test]
    async fn reported_path_is_used_and_defaults_fill_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path(), Some("mp4"), true);
        let outcome = orch.download("j1", "https://x", "best", &CancellationToken::new()).await;
        let media = match outcome {
            DownloadOutcome::Completed(media) => media,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(media.file_path, dir.path().join("j1.mp4"));
        assert_eq!(media.title, "Clip");
        assert_eq!(media.uploader, UNKNOWN_UPLOADER);
    }

    #[tokio::test]
    async fn prefix_scan_finds_unreported_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("j2.mkv.part"), b"partial partial").unwrap();
        std::fs::write(dir.path().join("other.mkv"), b"not ours at all").unwrap();
        let (orch, _) = orchestrator(dir.path(), Some("mkv"), false);
        let outcome = orch.download("j2", "https://x", "best", &CancellationToken::new()).await;
        let media = match outcome {
            DownloadOutcome::Completed(media) => media,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(media.file_path, dir.path().join("j2.mkv"));
    }

    #[tokio::test]
    async fn cancelled_token_skips_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, backend) = orchestrator(dir.path(), Some("mp4"), true);
        let token = CancellationToken::new();
        token.cancel();
        let outcome = orch.download("j3", "https://x", "best", &token).await;
        assert!(matches!(outcome, DownloadOutcome::Cancelled));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backend_error_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("j4.mp4.part"), b"half").unwrap();
        let (orch, backend) = orchestrator(dir.path(), None, false);
        let outcome = orch.download("j4", "https://x", "best", &CancellationToken::new()).await;
        assert!(matches!(outcome, DownloadOutcome::Failed(DownloadError::YtDlp(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("j4.mp4.part").exists());
    }

    struct Silent;

    impl DownloadBackend for Silent {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn fetch(&self, _: &FetchRequest) -> Result<FetchReport, DownloadError> {
            Ok(FetchReport::default())
        }

        fn describe(&self, _: &str) -> Result<RemoteMedia, DownloadError> {
            Err("unsupported".into())
        }
    }

    #[tokio::test]
    async fn missing_output_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        // another job's finished file must not be picked up
        std::fs::write(dir.path().join("j5.mp4"), b"data").unwrap();
        let orch = DownloadOrchestrator::new(Arc::new(Silent), dir.path());
        let outcome = orch.download("j6", "https://x", "best", &CancellationToken::new()).await;
        assert!(matches!(outcome, DownloadOutcome::Failed(DownloadError::FileNotFound(_))));
    }
}
