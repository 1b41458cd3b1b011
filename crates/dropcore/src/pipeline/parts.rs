//! Per-part metadata after splitting.

use std::path::{Path, PathBuf};

use crate::media::{MediaInfo, Prober};

/// What a part is uploaded with.
#[derive(Debug, Clone, PartialEq)]
pub struct PartMetadata {
    pub path: PathBuf,
    /// Seconds; `None` only when the original duration was unknown too
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: u64,
}

impl PartMetadata {
    /// Whole seconds for upload hints
    pub fn duration_secs(&self) -> Option<u32> {
        self.duration.filter(|d| *d > 0.0).map(|d| d.round() as u32)
    }
}

/// Share of the original duration proportional to the part's share of the bytes.
pub fn estimate_part_duration(original_duration: f64, part_size: u64, original_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    original_duration * (part_size as f64 / original_size as f64)
}

/// Metadata for every file about to be uploaded.
///
/// A lone unsplit file reuses the original probe. Split parts are measured
/// and re-probed; a part whose duration cannot be probed gets the
/// proportional estimate, dimensions fall back to the original's.
pub async fn measure_parts(
    prober: &dyn Prober,
    original_path: &Path,
    original: &MediaInfo,
    original_size: u64,
    parts: &[PathBuf],
) -> Vec<PartMetadata> {
    let original_duration = original.has_duration().then_some(original.duration);

    if let [only] = parts {
        if only == original_path {
            return vec![PartMetadata {
                path: only.clone(),
                duration: original_duration,
                width: original.width,
                height: original.height,
                size: original_size,
            }];
        }
    }

    let mut measured = Vec::with_capacity(parts.len());
    for path in parts {
        let size = fs_err::tokio::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        let info = prober.probe(path).await;
        let duration = if info.has_duration() {
            Some(info.duration)
        } else {
            let estimate = original_duration.map(|d| estimate_part_duration(d, size, original_size));
            log::warn!(
                "[SPLIT] no duration for {}, estimated {:?}s from its size",
                path.display(),
                estimate
            );
            estimate
        };
        measured.push(PartMetadata {
            path: path.clone(),
            duration,
            width: info.width.or(original.width),
            height: info.height.or(original.height),
            size,
        });
    }
    measured
}
