//! yt-dlp backed [`DownloadBackend`].
//!
//! The download call asks yt-dlp to print a small JSON object after the
//! final move, so the resolved path, title and uploader come back on stdout
//! without a second metadata run. When that line is missing the orchestrator
//! falls back to scanning the download directory.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;

use crate::core::config;
use crate::core::process::wait_with_output_timeout;
use crate::download::backend::{DownloadBackend, FetchReport, FetchRequest, FormatOption, RemoteMedia};
use crate::download::DownloadError;

const PROGRAM: &str = "yt-dlp";
const AFTER_MOVE_TEMPLATE: &str = "after_move:%(.{title,uploader,duration,filepath})j";
const BEST_QUALITY_LABEL: &str = "Best Quality";

/// "bestvideo+bestaudio" alone fails on single-file sites, so it gets the fallback.
pub fn normalize_format(format_id: &str) -> String {
    let trimmed = format_id.trim();
    if trimmed.is_empty() || trimmed == "bestvideo+bestaudio" {
        config::download::BEST_FORMAT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Arguments for a full download of `request`.
pub fn build_download_args(request: &FetchRequest) -> Vec<String> {
    vec![
        "-f".to_string(),
        normalize_format(&request.format_id),
        "-o".to_string(),
        request.output_template().to_string_lossy().into_owned(),
        "--no-playlist".to_string(),
        "--continue".to_string(),
        "--retries".to_string(),
        config::download::RETRIES.to_string(),
        "--fragment-retries".to_string(),
        config::download::FRAGMENT_RETRIES.to_string(),
        "--merge-output-format".to_string(),
        config::download::MERGE_FORMAT.to_string(),
        "--no-progress".to_string(),
        "--no-simulate".to_string(),
        "--print".to_string(),
        AFTER_MOVE_TEMPLATE.to_string(),
        request.url.clone(),
    ]
}

pub fn build_describe_args(url: &str) -> Vec<String> {
    vec![
        "-J".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

#[derive(Debug, Deserialize)]
struct AfterMove {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    filepath: Option<String>,
}

/// Picks the last JSON line yt-dlp printed; anything else yields an empty report.
pub fn parse_fetch_output(stdout: &str) -> FetchReport {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<AfterMove>(line).ok())
        .map(|m| FetchReport {
            file_path: m.filepath.filter(|p| !p.is_empty()).map(PathBuf::from),
            title: m.title,
            uploader: m.uploader,
            duration: m.duration,
        })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct InfoFormat {
    format_id: Option<String>,
    resolution: Option<String>,
    ext: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<InfoFormat>,
}

/// Parses `yt-dlp -J`: audio-only formats are dropped and a best-quality
/// entry is always appended last.
pub fn parse_describe_output(stdout: &[u8]) -> Result<RemoteMedia, DownloadError> {
    let info: InfoJson = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::YtDlp(format!("unreadable yt-dlp metadata: {}", e)))?;

    let mut formats: Vec<FormatOption> = info
        .formats
        .into_iter()
        .filter(|f| f.resolution.as_deref() != Some("audio only"))
        .filter_map(|f| {
            let format_id = f.format_id?;
            Some(FormatOption {
                format_id,
                resolution: f.resolution.unwrap_or_else(|| "Unknown".to_string()),
                ext: f.ext.unwrap_or_else(|| config::download::MERGE_FORMAT.to_string()),
                filesize: f.filesize.or(f.filesize_approx.map(|v| v as u64)),
            })
        })
        .collect();

    formats.push(FormatOption {
        format_id: config::download::BEST_FORMAT.to_string(),
        resolution: BEST_QUALITY_LABEL.to_string(),
        ext: config::download::MERGE_FORMAT.to_string(),
        filesize: None,
    });

    Ok(RemoteMedia {
        title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
        uploader: info.uploader,
        duration: info.duration,
        formats,
    })
}

#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    bin: String,
    download_timeout: Duration,
    info_timeout: Duration,
}

impl YtDlpBackend {
    pub fn new(bin: impl Into<String>, download_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            download_timeout,
            info_timeout: config::process::ytdlp_info_timeout(),
        }
    }

    fn run(&self, args: &[String], timeout: Duration) -> Result<std::process::Output, DownloadError> {
        let child = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DownloadError::Process(format!("failed to start {}: {}", self.bin, e)))?;

        let output = wait_with_output_timeout(child, PROGRAM, timeout)?;
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = super::error::last_error_line(&stderr)
            .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
        Err(DownloadError::YtDlp(message))
    }
}

impl DownloadBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        PROGRAM
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchReport, DownloadError> {
        let args = build_download_args(request);
        log::info!(
            "[DOWNLOAD] {} format={} -> {}",
            request.url,
            normalize_format(&request.format_id),
            request.output_template().display()
        );
        let output = self.run(&args, self.download_timeout)?;
        Ok(parse_fetch_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn describe(&self, url: &str) -> Result<RemoteMedia, DownloadError> {
        let output = self.run(&build_describe_args(url), self.info_timeout)?;
        parse_describe_output(&output.stdout)
    }
}
