//! Thumbnails, screenshots and sample clips.
//!
//! Each operation probes the source itself and swallows its own failures:
//! `thumbnail` and `sample` return `None`, `screenshots` returns whatever
//! frames succeeded. All outputs are written next to the source file, whose
//! name carries the job id, so concurrent jobs never collide.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::core::config;
use crate::core::utils::sibling_path;
use crate::media::split::{discard, is_nonempty_file};
use crate::media::{seconds_arg, MediaTools};

/// How the `thumbnail` operation picks its frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThumbnailStrategy {
    /// One frame at 60% of the duration
    #[default]
    Midpoint,
    /// Several candidates, the largest JPEG wins (size as a detail proxy)
    BestFrame,
    /// First scene change, then the keyframe nearest 60%
    Scene,
}

/// Maps 0-100 quality onto ffmpeg's `q:v` scale (1 best, 31 worst).
pub fn quality_scale(quality: u8) -> u8 {
    let q = 31.0 - f64::from(quality) * 0.3;
    q.clamp(1.0, 31.0) as u8
}

/// Seek position for `fraction` of `duration`, kept away from both ends.
pub fn clamp_position(duration: f64, fraction: f64) -> f64 {
    let safe = (duration * 0.95).min(duration - 0.5).max(0.5);
    (safe * fraction).min(safe).max(1.0)
}

/// `count` timestamps evenly spaced strictly inside `(0, duration)`.
pub fn screenshot_positions(duration: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| duration * (i + 1) as f64 / (count + 1) as f64)
        .collect()
}

/// Start of a `length`-second clip beginning at 30%, pulled back to fit.
pub fn sample_start(total: f64, length: f64) -> f64 {
    let start = total * config::extract::SAMPLE_START_RATIO;
    if start + length > total {
        (total - length).max(0.0)
    } else {
        start
    }
}

fn nearest(times: &[f64], target: f64) -> Option<f64> {
    times
        .iter()
        .copied()
        .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
}

fn scale_filter() -> String {
    let size = config::extract::THUMBNAIL_SIZE;
    format!("scale={size}:{size}:force_original_aspect_ratio=decrease")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Single-frame extraction. Fast seek puts `-ss` before `-i`.
fn frame_args(input: &Path, output: &Path, position: f64, fast_seek: bool) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    if fast_seek {
        args.extend(["-ss".to_string(), seconds_arg(position), "-i".to_string(), path_arg(input)]);
    } else {
        args.extend(["-i".to_string(), path_arg(input), "-ss".to_string(), seconds_arg(position)]);
    }
    args.extend([
        "-vframes".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        scale_filter(),
        "-q:v".to_string(),
        quality_scale(config::extract::JPEG_QUALITY).to_string(),
        path_arg(output),
    ]);
    args
}

/// First frame matching a `select` expression.
fn select_args(input: &Path, output: &Path, select: &str) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-vf".to_string(),
        format!("select={},{}", select, scale_filter()),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        quality_scale(config::extract::JPEG_QUALITY).to_string(),
        path_arg(output),
    ]
}

fn screenshot_args(input: &Path, output: &Path, position: f64) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        seconds_arg(position),
        "-i".to_string(),
        path_arg(input),
        "-vframes".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        path_arg(output),
    ]
}

fn sample_args(input: &Path, output: &Path, start: f64, length: f64) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        seconds_arg(start),
        "-t".to_string(),
        seconds_arg(length),
        "-i".to_string(),
        path_arg(input),
        "-c".to_string(),
        "copy".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        path_arg(output),
    ]
}

pub fn thumbnail_path(source: &Path) -> PathBuf {
    sibling_path(source, "_thumb", Some("jpg"))
}

pub fn screenshot_path(source: &Path, number: usize) -> PathBuf {
    sibling_path(source, &format!("_screenshot_{}", number), Some("jpg"))
}

pub fn sample_path(source: &Path) -> PathBuf {
    sibling_path(source, "_sample", Some("mp4"))
}

async fn file_len(path: &Path) -> u64 {
    fs_err::tokio::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

pub struct FrameExtractor {
    tools: MediaTools,
    strategy: ThumbnailStrategy,
}

impl FrameExtractor {
    pub fn new(tools: MediaTools, strategy: ThumbnailStrategy) -> Self {
        Self { tools, strategy }
    }

    pub fn strategy(&self) -> ThumbnailStrategy {
        self.strategy
    }

    /// Runs ffmpeg and reports whether `output` ended up larger than `min_bytes`.
    async fn produce(&self, args: &[String], output: &Path, min_bytes: u64) -> bool {
        let timeout = config::process::ffmpeg_timeout();
        match self.tools.ffmpeg.run(args, timeout).await {
            Ok(()) => {
                let len = file_len(output).await;
                if len > min_bytes {
                    true
                } else {
                    log::debug!("[THUMBNAIL] {} too small ({} bytes)", output.display(), len);
                    discard(output).await;
                    false
                }
            }
            Err(e) => {
                log::debug!("[THUMBNAIL] ffmpeg failed for {}: {}", output.display(), e);
                discard(output).await;
                false
            }
        }
    }

    /// Thumbnail for `path` using the configured strategy; `None` on any failure.
    pub async fn thumbnail(&self, path: &Path) -> Option<PathBuf> {
        let info = self.tools.prober.probe(path).await;
        if !info.has_duration() {
            log::warn!("[THUMBNAIL] no duration for {}, skipping thumbnail", path.display());
            return None;
        }
        let output = thumbnail_path(path);

        let found = match self.strategy {
            ThumbnailStrategy::Midpoint => false,
            ThumbnailStrategy::BestFrame => self.best_frame(path, &output, info.duration).await,
            ThumbnailStrategy::Scene => self.scene_frame(path, &output, info.duration).await,
        };
        if found || self.midpoint_frame(path, &output, info.duration).await {
            log::info!("[THUMBNAIL] {} -> {}", path.display(), output.display());
            Some(output)
        } else {
            log::warn!("[THUMBNAIL] could not extract a frame from {}", path.display());
            None
        }
    }

    /// 60% of the duration: fast seek first, accurate seek as the fallback.
    async fn midpoint_frame(&self, input: &Path, output: &Path, duration: f64) -> bool {
        let position = duration * config::extract::THUMBNAIL_POSITION;
        if self.produce(&frame_args(input, output, position, true), output, 0).await {
            return true;
        }
        log::info!("[THUMBNAIL] fast seek failed, retrying with accurate seek");
        self.produce(&frame_args(input, output, position, false), output, 0).await
    }

    async fn best_frame(&self, input: &Path, output: &Path, duration: f64) -> bool {
        let mut best: Option<(PathBuf, u64)> = None;
        let mut candidates = Vec::new();

        for (i, fraction) in config::extract::BEST_FRAME_POSITIONS.iter().enumerate() {
            let candidate = sibling_path(input, &format!("_thumb_c{}", i + 1), Some("jpg"));
            let position = clamp_position(duration, *fraction);
            let args = frame_args(input, &candidate, position, true);
            if self.produce(&args, &candidate, config::extract::MIN_FRAME_BYTES).await {
                let len = file_len(&candidate).await;
                if best.as_ref().map_or(true, |(_, best_len)| len > *best_len) {
                    best = Some((candidate.clone(), len));
                }
                candidates.push(candidate);
            }
        }

        let Some((winner, len)) = best else {
            return false;
        };
        log::info!("[THUMBNAIL] best of {} candidates: {} bytes", candidates.len(), len);
        let renamed = fs_err::tokio::rename(&winner, output).await;
        for candidate in candidates.iter().filter(|c| **c != winner) {
            discard(candidate).await;
        }
        match renamed {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[THUMBNAIL] failed to keep best candidate: {}", e);
                discard(&winner).await;
                false
            }
        }
    }

    async fn scene_frame(&self, input: &Path, output: &Path, duration: f64) -> bool {
        let min = config::extract::MIN_FRAME_BYTES;
        let scene = format!("gt(scene\\,{})", config::extract::SCENE_THRESHOLD);
        let args = select_args(input, output, &scene);
        // scene scoring decodes the whole stream
        if let Ok(()) = self.tools.ffmpeg.run(&args, config::process::ffmpeg_long_timeout()).await {
            if file_len(output).await > min {
                return true;
            }
        }
        discard(output).await;

        let target = clamp_position(duration, config::extract::THUMBNAIL_POSITION);
        let keyframes = self.tools.prober.keyframes(input).await;
        match nearest(&keyframes, target) {
            Some(at) => self.produce(&frame_args(input, output, at, true), output, min).await,
            None => {
                self.produce(&select_args(input, output, "eq(pict_type\\,I)"), output, min)
                    .await
            }
        }
    }

    /// `count` frames at `duration * (i + 1) / (count + 1)`; failed frames are skipped.
    pub async fn screenshots(&self, path: &Path, count: usize) -> Vec<PathBuf> {
        let info = self.tools.prober.probe(path).await;
        if !info.has_duration() {
            log::warn!("[SCREENSHOTS] no duration for {}, skipping", path.display());
            return Vec::new();
        }

        let mut shots = Vec::with_capacity(count);
        for (i, position) in screenshot_positions(info.duration, count).into_iter().enumerate() {
            let output = screenshot_path(path, i + 1);
            if self.produce(&screenshot_args(path, &output, position), &output, 0).await {
                shots.push(output);
            } else {
                log::warn!("[SCREENSHOTS] frame {} at {:.1}s failed", i + 1, position);
            }
        }
        log::info!("[SCREENSHOTS] {}/{} frames from {}", shots.len(), count, path.display());
        shots
    }

    /// Stream-copied clip of `length` seconds starting at 30% of the source.
    pub async fn sample(&self, path: &Path, length: f64) -> Option<PathBuf> {
        let info = self.tools.prober.probe(path).await;
        if !info.has_duration() {
            log::warn!("[SAMPLE] no duration for {}, skipping", path.display());
            return None;
        }

        let start = sample_start(info.duration, length);
        let output = sample_path(path);
        let args = sample_args(path, &output, start, length);
        match self.tools.ffmpeg.run(&args, config::process::ffmpeg_long_timeout()).await {
            Ok(()) if is_nonempty_file(&output).await => {
                log::info!("[SAMPLE] {:.1}s clip from {:.1}s -> {}", length, start, output.display());
                Some(output)
            }
            Ok(()) => {
                log::warn!("[SAMPLE] ffmpeg produced no output for {}", path.display());
                discard(&output).await;
                None
            }
            Err(e) => {
                log::warn!("[SAMPLE] failed for {}: {}", path.display(), e);
                discard(&output).await;
                None
            }
        }
    }
}
