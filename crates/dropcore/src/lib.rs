//! dropcore: the URL-to-delivery pipeline behind dropbot.
//!
//! Nothing in this crate knows about Telegram. The chat platform, the
//! persistent store, the downloader and the media tools are reached through
//! traits so the pipeline can be driven by fakes in tests:
//!
//! - [`pipeline::ChatTransport`]: messages, uploads, media groups
//! - [`storage::JobStore`]: user preferences and URL records
//! - [`download::DownloadBackend`]: the blocking external downloader
//! - [`media::Prober`] / [`media::FfmpegRunner`]: ffprobe / ffmpeg

pub mod core;
pub mod download;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod storage;

pub use crate::core::error::{AppError, AppResult};
