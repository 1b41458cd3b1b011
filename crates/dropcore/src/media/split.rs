//! Duration-proportional splitting of oversized media files.
//!
//! A file above the size limit is cut into `ceil(size / limit)` time slices
//! of equal length with stream copy, so every part stays playable on its own.
//! Byte sizes of the parts only match under a constant bitrate; callers must
//! measure each part themselves.

use std::path::{Path, PathBuf};

use crate::core::config;
use crate::core::utils::{remove_if_exists, sibling_path};
use crate::media::{seconds_arg, MediaTools};

/// One time slice of the source: `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartSpan {
    /// 1-based part number, as used in file names and captions
    pub number: usize,
    pub start: f64,
    pub duration: f64,
}

/// Number of parts needed so that none exceeds `max_part_size` (at constant bitrate).
pub fn part_count(file_size: u64, max_part_size: u64) -> usize {
    if max_part_size == 0 {
        return 1;
    }
    usize::try_from(file_size.div_ceil(max_part_size)).unwrap_or(usize::MAX).max(1)
}

/// Equal-length, ordered, non-overlapping spans covering `[0, duration)`.
pub fn plan_parts(file_size: u64, max_part_size: u64, duration: f64) -> Vec<PartSpan> {
    let count = part_count(file_size, max_part_size);
    let part_duration = duration / count as f64;
    (0..count)
        .map(|i| PartSpan {
            number: i + 1,
            start: i as f64 * part_duration,
            duration: part_duration,
        })
        .collect()
}

/// `<stem>_part<n>.<ext>` next to the source.
pub fn part_path(source: &Path, number: usize) -> PathBuf {
    sibling_path(source, &format!("_part{}", number), None)
}

fn part_args(source: &Path, span: &PartSpan, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        seconds_arg(span.start),
        "-t".to_string(),
        seconds_arg(span.duration),
        "-i".to_string(),
        source.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

pub struct FileSplitter {
    tools: MediaTools,
}

impl FileSplitter {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    /// Splits `path` into playable parts no larger than `max_part_size` (approximately).
    ///
    /// Returns `[path]` unchanged when the file already fits, when its
    /// duration cannot be probed, or when every part fails. Failed parts are
    /// logged, removed from disk and left out of the result.
    pub async fn split(&self, path: &Path, max_part_size: u64) -> Vec<PathBuf> {
        let file_size = match fs_err::tokio::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::error!("[SPLIT] cannot stat {}: {}", path.display(), e);
                return vec![path.to_path_buf()];
            }
        };

        if file_size <= max_part_size {
            log::info!(
                "[SPLIT] {} is {} bytes, within limit {}, no splitting needed",
                path.display(),
                file_size,
                max_part_size
            );
            return vec![path.to_path_buf()];
        }

        let info = self.tools.prober.probe(path).await;
        if !info.has_duration() {
            log::warn!(
                "[SPLIT] duration of {} is unknown, uploading it unsplit",
                path.display()
            );
            return vec![path.to_path_buf()];
        }

        let spans = plan_parts(file_size, max_part_size, info.duration);
        log::info!(
            "[SPLIT] splitting {} ({} MB, {:.1}s) into {} parts of ~{:.2}s",
            path.display(),
            file_size / 1024 / 1024,
            info.duration,
            spans.len(),
            spans.first().map_or(0.0, |s| s.duration)
        );

        let mut parts = Vec::with_capacity(spans.len());
        for span in &spans {
            let output = part_path(path, span.number);
            let args = part_args(path, span, &output);
            match self.tools.ffmpeg.run(&args, config::process::ffmpeg_long_timeout()).await {
                Ok(()) if is_nonempty_file(&output).await => parts.push(output),
                Ok(()) => {
                    log::error!("[SPLIT] part {} produced no output", span.number);
                    discard(&output).await;
                }
                Err(e) => {
                    log::error!("[SPLIT] part {} failed: {}", span.number, e);
                    discard(&output).await;
                }
            }
        }

        if parts.is_empty() {
            log::error!("[SPLIT] every part failed, falling back to the original file");
            return vec![path.to_path_buf()];
        }

        log::info!("[SPLIT] produced {}/{} parts", parts.len(), spans.len());
        parts
    }
}

pub(crate) async fn is_nonempty_file(path: &Path) -> bool {
    fs_err::tokio::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

pub(crate) async fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path).await {
        log::warn!("{}", e);
    }
}
