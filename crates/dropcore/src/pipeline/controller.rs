//! Per-job sequencing: download, probe, split, upload, extras, cleanup.
//!
//! [`Pipeline::run`] is the only entry point. Whatever happens inside (an
//! error at any stage, cancellation, or a panic) it ends the job in exactly
//! one terminal state, edits the status message accordingly, purges the
//! cleanup set and releases the registry entry.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;

use crate::core::config::{self, Settings};
use crate::core::utils::is_valid_url;
use crate::download::{DownloadOrchestrator, DownloadOutcome, DownloadedMedia};
use crate::job::{ArtifactRole, CleanupSet, Job, JobStatus, JobTicket};
use crate::media::{FileSplitter, FrameExtractor, MediaInfo, MediaTools, ThumbnailStrategy};
use crate::pipeline::error::PipelineError;
use crate::pipeline::messages;
use crate::pipeline::parts::{measure_parts, PartMetadata};
use crate::pipeline::report::{JobReport, PartOutcome, UploadResult};
use crate::pipeline::status::StatusMessage;
use crate::pipeline::transport::{ChatTransport, MediaUpload, MessageRef, UploadKind};
use crate::pipeline::upload::UploadReporter;
use crate::storage::{JobStore, UploadMode, UserPreferences};

/// Knobs the controller reads per job.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_file_size: u64,
    pub screenshot_count: usize,
    pub sample_duration: f64,
    pub thumbnail_strategy: ThumbnailStrategy,
    /// Where custom thumbnails are fetched to
    pub thumbnail_dir: PathBuf,
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_file_size: settings.max_file_size,
            screenshot_count: settings.screenshot_count,
            sample_duration: settings.sample_duration_secs,
            thumbnail_strategy: settings.thumbnail_strategy,
            thumbnail_dir: settings.download_dir.join("thumbnails"),
        }
    }
}

/// Mutable state of one job while it runs.
struct JobRun {
    job: Job,
    status: StatusMessage,
    cleanup: CleanupSet,
    report: JobReport,
    /// The user's own thumbnail, fetched once for the parts and the sample
    custom_thumbnail: Option<PathBuf>,
}

pub struct Pipeline {
    downloader: DownloadOrchestrator,
    tools: MediaTools,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn JobStore>,
    splitter: FileSplitter,
    extractor: FrameExtractor,
    reporter: UploadReporter,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        downloader: DownloadOrchestrator,
        tools: MediaTools,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn JobStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            splitter: FileSplitter::new(tools.clone()),
            extractor: FrameExtractor::new(tools.clone(), config.thumbnail_strategy),
            reporter: UploadReporter::new(Arc::clone(&transport)),
            downloader,
            tools,
            transport,
            store,
            config,
        }
    }

    /// Replaces the upload reporter (tests shorten the progress interval).
    pub fn with_reporter(mut self, reporter: UploadReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn downloader(&self) -> &DownloadOrchestrator {
        &self.downloader
    }

    /// Runs `job` to a terminal state. `status` is the message the job edits.
    ///
    /// The ticket is held until cleanup has finished, so the user cannot
    /// start a new job while this one's files still exist.
    pub async fn run(&self, job: Job, ticket: JobTicket, status: MessageRef) -> JobReport {
        let job_id = job.id.clone();
        log::info!("[PIPELINE] job {} started for user {}: {}", job_id, job.user_id, job.url);

        let mut run = JobRun {
            report: JobReport::new(job.id.clone()),
            status: StatusMessage::new(Arc::clone(&self.transport), status),
            cleanup: CleanupSet::new(),
            custom_thumbnail: None,
            job,
        };

        let outcome = match AssertUnwindSafe(self.execute(&mut run)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("[PIPELINE] job {} panicked: {}", job_id, message);
                Err(PipelineError::Unexpected(message))
            }
        };

        self.finish(&mut run, outcome).await;
        run.cleanup.purge().await;
        drop(ticket);

        log::info!("[PIPELINE] job {} finished as {}", job_id, run.report.status);
        run.report
    }

    async fn finish(&self, run: &mut JobRun, outcome: Result<(), PipelineError>) {
        match outcome {
            Ok(()) => {}
            Err(e) => {
                let terminal = e.terminal_status();
                match &e {
                    PipelineError::Cancelled { stage } => {
                        log::info!("[PIPELINE] job {} cancelled during {}", run.job.id, stage)
                    }
                    other => log::error!("[PIPELINE] job {} failed: {}", run.job.id, other),
                }
                run.status.set(&e.user_message()).await;
                run.report.error = Some(e.to_string());
                self.transition(run, terminal).await;
            }
        }
        run.report.status = run.job.status();
    }

    /// Advances the state machine and persists the new status.
    async fn transition(&self, run: &mut JobRun, next: JobStatus) {
        if !run.job.advance(next) {
            return;
        }
        run.report.stages.push(next);
        if let Err(e) = self.store.set_url_status(&run.job.url_id, next).await {
            log::warn!("[PIPELINE] could not persist status {} for {}: {}", next, run.job.url_id, e);
        }
    }

    fn check_cancelled(run: &JobRun) -> Result<(), PipelineError> {
        if run.job.is_cancelled() {
            Err(PipelineError::Cancelled {
                stage: run.job.status(),
            })
        } else {
            Ok(())
        }
    }

    async fn execute(&self, run: &mut JobRun) -> Result<(), PipelineError> {
        if !is_valid_url(&run.job.url) {
            return Err(PipelineError::InvalidInput(format!("not a downloadable URL: {}", run.job.url)));
        }
        let prefs = self
            .store
            .user_preferences(run.job.user_id)
            .await
            .map_err(|e| PipelineError::Unexpected(format!("could not load preferences: {}", e)))?;

        let media = self.download_stage(run).await?;
        let (parts, info) = self.processing_stage(run, &media, &prefs).await?;
        self.upload_stage(run, &media, &parts, &info, &prefs).await?;

        if prefs.upload_mode == UploadMode::Video {
            if prefs.generate_screenshots {
                self.screenshot_stage(run, &media).await?;
            }
            if prefs.generate_sample_video {
                self.sample_stage(run, &media, &info).await?;
            }
        }

        self.transition(run, JobStatus::Completed).await;
        let total_size: u64 = parts.iter().map(|p| p.size).sum();
        let summary = messages::completed(&media.title, &run.job.format_id, total_size, info.duration, parts.len());
        run.status.set(&summary).await;
        Ok(())
    }

    async fn download_stage(&self, run: &mut JobRun) -> Result<DownloadedMedia, PipelineError> {
        self.transition(run, JobStatus::Downloading).await;
        run.status
            .set(&messages::download_started(&run.job.url, &run.job.format_id))
            .await;

        let job = &run.job;
        match self
            .downloader
            .download(job.id.as_str(), &job.url, &job.format_id, &job.cancel)
            .await
        {
            DownloadOutcome::Completed(media) => {
                run.cleanup.track(&media.file_path, ArtifactRole::Original);
                Ok(media)
            }
            DownloadOutcome::Cancelled => Err(PipelineError::Cancelled {
                stage: JobStatus::Downloading,
            }),
            DownloadOutcome::Failed(e) => Err(PipelineError::DownloadFailure(e)),
        }
    }

    /// Probes the original and splits it when it is over the limit.
    async fn processing_stage(
        &self,
        run: &mut JobRun,
        media: &DownloadedMedia,
        prefs: &UserPreferences,
    ) -> Result<(Vec<PartMetadata>, MediaInfo), PipelineError> {
        self.transition(run, JobStatus::Processing).await;
        run.status.set(&messages::download_complete(&media.title)).await;

        let original = &media.file_path;
        let size = match fs_err::tokio::metadata(original).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            Ok(_) => return Err(PipelineError::ProcessingFailure("downloaded file is empty".to_string())),
            Err(e) => {
                return Err(PipelineError::ProcessingFailure(format!(
                    "downloaded file is unreadable: {}",
                    e
                )))
            }
        };

        let mut info = self.tools.prober.probe(original).await;
        if !info.has_duration() {
            // the downloader's own figure is better than nothing for captions
            if let Some(d) = media.duration.filter(|d| *d > 0.0) {
                info.duration = d;
            }
        }
        log::info!(
            "[PIPELINE] {}: {} bytes, {:.1}s, {:?}x{:?}",
            original.display(),
            size,
            info.duration,
            info.width,
            info.height
        );

        let paths = if size > self.config.max_file_size && prefs.split_enabled {
            Self::check_cancelled(run)?;
            run.status.set(&messages::splitting(size)).await;
            let parts = self.splitter.split(original, self.config.max_file_size).await;
            run.cleanup
                .track_all(parts.iter().filter(|p| p.as_path() != original.as_path()), ArtifactRole::Part);
            parts
        } else {
            if size > self.config.max_file_size {
                log::warn!("[PIPELINE] {} is over the limit but splitting is off", original.display());
            }
            vec![original.clone()]
        };

        let parts = measure_parts(self.tools.prober.as_ref(), original, &info, size, &paths).await;
        Ok((parts, info))
    }

    async fn fetch_custom_thumbnail(&self, run: &mut JobRun, file_ref: &str) -> Option<PathBuf> {
        run.status.set(messages::preparing_thumbnail()).await;
        if let Err(e) = fs_err::tokio::create_dir_all(&self.config.thumbnail_dir).await {
            log::warn!("[THUMBNAIL] cannot create {}: {}", self.config.thumbnail_dir.display(), e);
            return None;
        }
        let dest = self
            .config
            .thumbnail_dir
            .join(format!("thumb_{}_{}.jpg", run.job.user_id, run.job.id));
        run.cleanup.track(&dest, ArtifactRole::Thumbnail);

        match self.transport.download_media(file_ref, &dest).await {
            Ok(path) if crate::media::split::is_nonempty_file(&path).await => {
                run.cleanup.track(&path, ArtifactRole::Thumbnail);
                Some(path)
            }
            Ok(path) => {
                log::warn!("[THUMBNAIL] custom thumbnail {} is empty", path.display());
                None
            }
            Err(e) => {
                log::error!("[THUMBNAIL] failed to download custom thumbnail: {}", e);
                None
            }
        }
    }

    /// Custom thumbnail when available, else one generated from `path` in video mode.
    async fn thumbnail_for(
        &self,
        run: &mut JobRun,
        path: &Path,
        custom: Option<&Path>,
        mode: UploadMode,
    ) -> Option<PathBuf> {
        if let Some(custom) = custom {
            return Some(custom.to_path_buf());
        }
        if mode != UploadMode::Video {
            return None;
        }
        let thumb = self.extractor.thumbnail(path).await?;
        run.cleanup.track(&thumb, ArtifactRole::Thumbnail);
        Some(thumb)
    }

    async fn upload_stage(
        &self,
        run: &mut JobRun,
        media: &DownloadedMedia,
        parts: &[PartMetadata],
        info: &MediaInfo,
        prefs: &UserPreferences,
    ) -> Result<(), PipelineError> {
        run.custom_thumbnail = match prefs.thumbnail.as_deref() {
            Some(file_ref) => self.fetch_custom_thumbnail(run, file_ref).await,
            None => None,
        };
        let custom_thumbnail = run.custom_thumbnail.clone();

        self.transition(run, JobStatus::Uploading).await;
        let base = messages::base_caption(&media.title, prefs.active_caption());
        let count = parts.len();
        let mut last_error = None;

        for (i, part) in parts.iter().enumerate() {
            Self::check_cancelled(run)?;
            let index = i + 1;
            let thumbnail = self
                .thumbnail_for(run, &part.path, custom_thumbnail.as_deref(), prefs.upload_mode)
                .await;

            let file_name = part
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            run.status
                .set(&messages::starting_upload(&file_name, index, count, part.size))
                .await;

            let upload = MediaUpload {
                thumbnail,
                duration: part.duration_secs().or(info.duration_secs()),
                width: part.width,
                height: part.height,
                ..MediaUpload::new(
                    &part.path,
                    messages::part_caption(&base, index, count, part.duration, part.size),
                    UploadKind::for_file(prefs.upload_mode, &part.path),
                )
            };

            let result = self
                .reporter
                .upload(run.job.chat_id, Some(run.status.message()), &upload)
                .await;
            run.status.invalidate();

            let result = match result {
                Ok(sent) => UploadResult::Sent(sent),
                Err(e) => {
                    let text = messages::part_upload_failed(index, &e.to_string());
                    if let Err(send_err) = self.transport.send_message(run.job.chat_id, &text).await {
                        log::warn!("[PIPELINE] could not report part failure: {}", send_err);
                    }
                    last_error = Some(e.to_string());
                    UploadResult::Failed(e.to_string())
                }
            };
            run.report.parts.push(PartOutcome {
                index,
                path: part.path.clone(),
                result,
            });
        }

        if run.report.sent_parts() == 0 {
            return Err(PipelineError::UploadFailure(
                last_error.unwrap_or_else(|| "nothing to upload".to_string()),
            ));
        }
        Ok(())
    }

    async fn screenshot_stage(&self, run: &mut JobRun, media: &DownloadedMedia) -> Result<(), PipelineError> {
        Self::check_cancelled(run)?;
        self.transition(run, JobStatus::Screenshotting).await;
        run.status.set(messages::generating_screenshots()).await;

        let count = self.config.screenshot_count.min(config::upload::MEDIA_GROUP_LIMIT);
        let shots = self.extractor.screenshots(&media.file_path, count).await;
        run.cleanup.track_all(&shots, ArtifactRole::Screenshot);
        if shots.is_empty() {
            return Ok(());
        }

        let caption = messages::screenshot_caption(1);
        match self
            .transport
            .send_media_group(run.job.chat_id, &shots, Some(&caption))
            .await
        {
            Ok(sent) => run.report.screenshots_sent = sent.len(),
            Err(e) => log::error!("[SCREENSHOTS] failed to send album: {}", e),
        }
        Ok(())
    }

    async fn sample_stage(
        &self,
        run: &mut JobRun,
        media: &DownloadedMedia,
        original: &MediaInfo,
    ) -> Result<(), PipelineError> {
        Self::check_cancelled(run)?;
        self.transition(run, JobStatus::Sampling).await;
        run.status.set(messages::generating_sample()).await;

        let Some(sample) = self.extractor.sample(&media.file_path, self.config.sample_duration).await else {
            return Ok(());
        };
        run.cleanup.track(&sample, ArtifactRole::Sample);

        let info = self.tools.prober.probe(&sample).await;
        let custom = run.custom_thumbnail.clone();
        let thumbnail = self
            .thumbnail_for(run, &sample, custom.as_deref(), UploadMode::Video)
            .await;

        let upload = MediaUpload {
            thumbnail,
            duration: info
                .duration_secs()
                .or(Some(self.config.sample_duration.round() as u32)),
            width: info.width.or(original.width),
            height: info.height.or(original.height),
            ..MediaUpload::new(
                &sample,
                messages::sample_caption(&media.title),
                UploadKind::for_file(UploadMode::Video, &sample),
            )
        };

        match self
            .reporter
            .upload(run.job.chat_id, Some(run.status.message()), &upload)
            .await
        {
            Ok(_) => run.report.sample_sent = true,
            Err(e) => log::error!("[SAMPLE] upload failed: {}", e),
        }
        run.status.invalidate();
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings() {
        let settings = Settings {
            download_dir: PathBuf::from("/data/dl"),
            ..Settings::default()
        };
        let config = PipelineConfig::from(&settings);
        assert_eq!(config.thumbnail_dir, PathBuf::from("/data/dl/thumbnails"));
        assert_eq!(config.max_file_size, config::limits::MAX_FILE_SIZE);
        assert_eq!(config.screenshot_count, 10);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
