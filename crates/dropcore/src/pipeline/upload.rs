//! Upload with throttled progress reporting.
//!
//! While a file is in flight a ticker task edits the status message at a
//! fixed interval (never faster) with percentage, bar, average speed and ETA.
//! If the platform rejects the upload because of the thumbnail, it is tried
//! exactly once more without one.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::config;
use crate::pipeline::messages;
use crate::pipeline::progress::{ProgressSnapshot, UploadProgress};
use crate::pipeline::transport::{ChatTransport, MediaUpload, MessageRef, TransportError};

/// Whether a failed upload is blamed on its thumbnail.
pub fn is_thumbnail_error(error: &TransportError) -> bool {
    error.to_string().to_lowercase().contains("thumb")
}

pub struct UploadReporter {
    transport: Arc<dyn ChatTransport>,
    interval: Duration,
}

impl UploadReporter {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_interval(transport, config::upload::progress_interval())
    }

    pub fn with_interval(transport: Arc<dyn ChatTransport>, interval: Duration) -> Self {
        Self { transport, interval }
    }

    /// Sends `upload` to `chat_id`, reporting progress on `status` if given.
    pub async fn upload(
        &self,
        chat_id: i64,
        status: Option<MessageRef>,
        upload: &MediaUpload,
    ) -> Result<MessageRef, TransportError> {
        let total = fs_err::tokio::metadata(&upload.path).await?.len();

        match self.attempt(chat_id, status, upload, total).await {
            Ok(sent) => Ok(sent),
            Err(e) if is_thumbnail_error(&e) => {
                log::warn!("[UPLOAD] {} rejected over its thumbnail ({}), retrying without", upload.file_name(), e);
                let retry = MediaUpload {
                    thumbnail: None,
                    caption: messages::without_thumbnail_note(&upload.caption),
                    ..upload.clone()
                };
                self.attempt(chat_id, status, &retry, total).await
            }
            Err(e) => Err(e),
        }
    }

    async fn attempt(
        &self,
        chat_id: i64,
        status: Option<MessageRef>,
        upload: &MediaUpload,
        total: u64,
    ) -> Result<MessageRef, TransportError> {
        let progress = UploadProgress::new();
        let ticker = status.map(|message| TickerGuard(self.spawn_ticker(message, upload.file_name(), total, progress.clone())));

        log::info!(
            "[UPLOAD] {} ({} bytes) as {:?} to chat {}",
            upload.path.display(),
            total,
            upload.kind,
            chat_id
        );
        let result = self.transport.send_media(chat_id, upload, progress).await;
        drop(ticker);

        match &result {
            Ok(_) => log::info!("[UPLOAD] {} sent", upload.file_name()),
            Err(e) => log::error!("[UPLOAD] {} failed: {}", upload.file_name(), e),
        }
        result
    }

    fn spawn_ticker(&self, message: MessageRef, file_name: String, total: u64, progress: UploadProgress) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let period = self.interval;
        tokio::spawn(async move {
            let start = Instant::now();
            let mut ticks = tokio::time::interval_at(start + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_text = String::new();
            loop {
                ticks.tick().await;
                let snapshot = ProgressSnapshot::new(progress.bytes_sent(), total, start.elapsed());
                let text = messages::upload_progress(&file_name, &snapshot);
                if text == last_text {
                    continue;
                }
                if let Err(e) = transport.edit_message(message, &text).await {
                    log::debug!("[UPLOAD] progress edit failed: {}", e);
                }
                last_text = text;
            }
        })
    }
}

/// Stops the progress ticker when the upload ends, including by unwinding.
struct TickerGuard(JoinHandle<()>);

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::pipeline::transport::UploadKind;

    const STATUS: MessageRef = MessageRef {
        chat_id: 7,
        message_id: 1,
    };

    /// Streams a file in ten 100-byte steps, 100 ms apart, and records every edit.
    #[derive(Default)]
    struct SlowTransport {
        edits: Mutex<Vec<(Instant, String)>>,
    }

    impl SlowTransport {
        fn edits(&self) -> Vec<(Instant, String)> {
            self.edits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for SlowTransport {
        async fn send_message(&self, chat_id: i64, _text: &str) -> Result<MessageRef, TransportError> {
            Ok(MessageRef { chat_id, message_id: 2 })
        }

        async fn edit_message(&self, _message: MessageRef, text: &str) -> Result<(), TransportError> {
            self.edits.lock().unwrap().push((Instant::now(), text.to_string()));
            Ok(())
        }

        async fn send_media(
            &self,
            chat_id: i64,
            _upload: &MediaUpload,
            progress: UploadProgress,
        ) -> Result<MessageRef, TransportError> {
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                progress.add_bytes(100);
            }
            Ok(MessageRef { chat_id, message_id: 3 })
        }

        async fn send_media_group(
            &self,
            _chat_id: i64,
            _photos: &[PathBuf],
            _caption: Option<&str>,
        ) -> Result<Vec<MessageRef>, TransportError> {
            Ok(Vec::new())
        }

        async fn download_media(&self, _file_ref: &str, dest: &Path) -> Result<PathBuf, TransportError> {
            Ok(dest.to_path_buf())
        }
    }

    #[tokio::test]
    async fn progress_edits_are_throttled_to_the_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.mp4");
        std::fs::write(&path, vec![0u8; 1000]).unwrap();

        let interval = Duration::from_millis(300);
        let transport = Arc::new(SlowTransport::default());
        let reporter = UploadReporter::with_interval(transport.clone(), interval);
        let upload = MediaUpload::new(&path, "caption", UploadKind::Video);

        let started = Instant::now();
        reporter.upload(7, Some(STATUS), &upload).await.unwrap();
        let elapsed = started.elapsed();

        let edits = transport.edits();
        let ceiling = (elapsed.as_millis() / interval.as_millis()) as usize;
        assert!(!edits.is_empty(), "no progress was reported");
        assert!(edits.len() <= ceiling, "{} edits in {:?}", edits.len(), elapsed);

        // timer wakeups may land a few ms after their deadline
        let slack = Duration::from_millis(30);
        assert!(edits[0].0.duration_since(started) + slack >= interval);
        for pair in edits.windows(2) {
            assert!(pair[1].0.duration_since(pair[0].0) + slack >= interval);
            assert_ne!(pair[0].1, pair[1].1);
        }

        let (_, last) = edits.last().unwrap();
        assert!(last.contains("<b>File:</b> job.mp4"), "{last}");
        assert!(last.contains("<b>Progress:</b> ") && last.contains('%'), "{last}");
        assert!(last.contains('█') && last.contains('░'), "{last}");
        assert!(last.contains("<b>Speed:</b> ") && last.contains("<b>ETA:</b> "), "{last}");
        assert!(last.contains(" / 1000 B"), "{last}");

        // the ticker stops with the upload
        tokio::time::sleep(interval + interval / 2).await;
        assert_eq!(transport.edits().len(), edits.len());
    }

    #[test]
    fn thumbnail_errors_are_recognised_by_text() {
        assert!(is_thumbnail_error(&TransportError::Api("Bad Request: THUMB_INVALID".into())));
        assert!(is_thumbnail_error(&TransportError::Api("wrong thumbnail dimensions".into())));
        assert!(!is_thumbnail_error(&TransportError::Api("Bad Request: file is too big".into())));
        assert!(!is_thumbnail_error(&TransportError::Network("timed out".into())));
    }
}
