//! Media tooling: probing, splitting and frame/clip extraction.
//!
//! Everything here degrades instead of failing: probes return zeroed
//! metadata, extractors return `None`/empty and the splitter falls back to
//! the original file. Errors are logged where they happen.

use std::sync::Arc;

use crate::core::config::Settings;

pub mod extract;
pub mod ffmpeg;
pub mod probe;
pub mod split;

pub use extract::{FrameExtractor, ThumbnailStrategy};
pub use ffmpeg::{FfmpegRunner, SystemFfmpeg};
pub use probe::{FfprobeProber, MediaInfo, Prober};
pub use split::FileSplitter;

/// The two external media tools a job needs, behind their traits.
#[derive(Clone)]
pub struct MediaTools {
    pub prober: Arc<dyn Prober>,
    pub ffmpeg: Arc<dyn FfmpegRunner>,
}

impl MediaTools {
    pub fn new(prober: Arc<dyn Prober>, ffmpeg: Arc<dyn FfmpegRunner>) -> Self {
        Self { prober, ffmpeg }
    }

    /// ffprobe/ffmpeg binaries from settings
    pub fn system(settings: &Settings) -> Self {
        Self {
            prober: Arc::new(FfprobeProber::new(settings.ffprobe_bin.clone())),
            ffmpeg: Arc::new(SystemFfmpeg::new(settings.ffmpeg_bin.clone())),
        }
    }
}

/// ffmpeg takes seek offsets in seconds; millisecond precision is plenty.
pub(crate) fn seconds_arg(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}
