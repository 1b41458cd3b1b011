//! ffprobe-based metadata extraction.
//!
//! Probing never fails from the caller's point of view: a missing tool,
//! a timeout or unparsable output all produce a zeroed [`MediaInfo`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::core::config;
use crate::core::process::run_checked;

/// Video stream metadata. `duration` is 0.0 when unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: f64,
    pub codec_name: Option<String>,
    pub bit_rate: Option<u64>,
    pub frame_rate: Option<f64>,
}

impl MediaInfo {
    pub fn has_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }

    /// Whole seconds, as upload hints expect.
    pub fn duration_secs(&self) -> Option<u32> {
        self.has_duration().then(|| self.duration.round() as u32)
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaInfo;

    /// Keyframe timestamps of the first video stream, ascending.
    async fn keyframes(&self, _path: &Path) -> Vec<f64> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    bit_rate: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobePacket {
    #[serde(default)]
    pts_time: Option<String>,
    #[serde(default)]
    flags: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobePackets {
    #[serde(default)]
    packets: Vec<FfprobePacket>,
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num == 0.0 {
        return None;
    }
    Some(num / den)
}

fn parse_bit_rate(s: &str) -> Option<u64> {
    s.trim().parse().ok()
}

/// Parses `ffprobe -of json` output for the first video stream.
///
/// Duration comes from the stream, falling back to the container. Bit rate
/// likewise.
pub fn parse_ffprobe_json(bytes: &[u8]) -> Option<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_slice(bytes).ok()?;
    let stream = output.streams.first();
    let format = output.format.as_ref();

    let duration = stream
        .and_then(|s| s.duration.as_deref())
        .and_then(parse_seconds)
        .or_else(|| format.and_then(|f| f.duration.as_deref()).and_then(parse_seconds))
        .unwrap_or(0.0);

    let bit_rate = stream
        .and_then(|s| s.bit_rate.as_deref())
        .and_then(parse_bit_rate)
        .or_else(|| format.and_then(|f| f.bit_rate.as_deref()).and_then(parse_bit_rate));

    Some(MediaInfo {
        width: stream.and_then(|s| s.width).filter(|w| *w > 0),
        height: stream.and_then(|s| s.height).filter(|h| *h > 0),
        duration,
        codec_name: stream.and_then(|s| s.codec_name.clone()),
        bit_rate,
        frame_rate: stream.and_then(|s| s.avg_frame_rate.as_deref()).and_then(parse_frame_rate),
    })
}

/// Timestamps of packets flagged `K` (keyframes), sorted.
pub fn parse_keyframes_json(bytes: &[u8]) -> Vec<f64> {
    let Ok(parsed) = serde_json::from_slice::<FfprobePackets>(bytes) else {
        return Vec::new();
    };
    let mut times: Vec<f64> = parsed
        .packets
        .iter()
        .filter(|p| p.flags.as_deref().is_some_and(|f| f.contains('K')))
        .filter_map(|p| p.pts_time.as_deref()?.trim().parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();
    times.sort_by(f64::total_cmp);
    times
}

/// [`Prober`] backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    bin: String,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            timeout: config::process::ffprobe_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaInfo {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
            .arg("stream=width,height,duration,codec_name,bit_rate,avg_frame_rate:format=duration,bit_rate")
            .args(["-of", "json"])
            .arg(path);

        match run_checked(&mut cmd, self.timeout).await {
            Ok(output) => parse_ffprobe_json(&output.stdout).unwrap_or_else(|| {
                log::warn!("[PROBE] unparsable ffprobe output for {}", path.display());
                MediaInfo::default()
            }),
            Err(e) => {
                log::warn!("[PROBE] ffprobe failed for {}: {}", path.display(), e);
                MediaInfo::default()
            }
        }
    }

    async fn keyframes(&self, path: &Path) -> Vec<f64> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-v", "error", "-select_streams", "v:0", "-show_entries", "packet=pts_time,flags"])
            .args(["-of", "json"])
            .arg(path);

        match run_checked(&mut cmd, config::process::ffmpeg_long_timeout()).await {
            Ok(output) => parse_keyframes_json(&output.stdout),
            Err(e) => {
                log::warn!("[PROBE] keyframe scan failed for {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }
}
