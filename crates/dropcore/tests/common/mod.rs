//! In-memory stand-ins for the chat platform, the store, the downloader and
//! the media tools.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dropcore::core::process::ProcessError;
use dropcore::download::{
    DownloadBackend, DownloadError, DownloadOrchestrator, FetchReport, FetchRequest, FormatOption, RemoteMedia,
};
use dropcore::job::{Job, JobId, JobRegistry, JobStatus, JobTicket};
use dropcore::media::{FfmpegRunner, MediaInfo, MediaTools, Prober, ThumbnailStrategy};
use dropcore::pipeline::{
    ChatTransport, MediaUpload, MessageRef, Pipeline, PipelineConfig, TransportError, UploadKind, UploadProgress,
    UploadReporter,
};
use dropcore::storage::{JobStore, UrlRecord, UserPreferences};
use dropcore::AppResult;

pub const CHAT_ID: i64 = 1001;
pub const USER_ID: i64 = 42;
pub const URL: &str = "https://example.com/watch?v=abc";

/// One observed transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        chat_id: i64,
        text: String,
    },
    Edit {
        message_id: i32,
        text: String,
    },
    Media {
        path: PathBuf,
        caption: String,
        kind: UploadKind,
        thumbnail: Option<PathBuf>,
        duration: Option<u32>,
        width: Option<u32>,
        existed: bool,
    },
    Group {
        files: Vec<PathBuf>,
        caption: Option<String>,
    },
    Download {
        file_ref: String,
        dest: PathBuf,
    },
}

#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI32,
    media_failures: Mutex<VecDeque<TransportError>>,
    always_fail_media: Mutex<Option<String>>,
    cancel_on_media: Mutex<Option<CancellationToken>>,
    panic_on_media: Mutex<bool>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI32::new(100),
            ..Self::default()
        })
    }

    /// The next `send_media` calls fail with these errors, in order.
    pub fn fail_next_media(&self, error: TransportError) {
        self.media_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_every_media(&self, text: &str) {
        *self.always_fail_media.lock().unwrap() = Some(text.to_string());
    }

    /// Cancels `token` as soon as the first upload arrives.
    pub fn cancel_on_first_media(&self, token: CancellationToken) {
        *self.cancel_on_media.lock().unwrap() = Some(token);
    }

    pub fn panic_on_media(&self) {
        *self.panic_on_media.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn media_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Media { .. }))
            .collect()
    }

    pub fn groups(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Group { .. }))
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Text of the most recent edit.
    pub fn last_edit(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Edit { text, .. } => Some(text),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_ref(&self, chat_id: i64) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, TransportError> {
        self.record(Call::Send {
            chat_id,
            text: text.to_string(),
        });
        Ok(self.next_ref(chat_id))
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        self.record(Call::Edit {
            message_id: message.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        upload: &MediaUpload,
        progress: UploadProgress,
    ) -> Result<MessageRef, TransportError> {
        let existed = upload.path.is_file();
        self.record(Call::Media {
            path: upload.path.clone(),
            caption: upload.caption.clone(),
            kind: upload.kind,
            thumbnail: upload.thumbnail.clone(),
            duration: upload.duration,
            width: upload.width,
            existed,
        });
        if let Some(token) = self.cancel_on_media.lock().unwrap().take() {
            token.cancel();
        }
        if *self.panic_on_media.lock().unwrap() {
            panic!("transport exploded");
        }
        if let Some(error) = self.media_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        if let Some(text) = self.always_fail_media.lock().unwrap().clone() {
            return Err(TransportError::Api(text));
        }
        let size = std::fs::metadata(&upload.path).map(|m| m.len()).unwrap_or(0);
        progress.add_bytes(size as usize);
        Ok(self.next_ref(chat_id))
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        files: &[PathBuf],
        caption: Option<&str>,
    ) -> Result<Vec<MessageRef>, TransportError> {
        self.record(Call::Group {
            files: files.to_vec(),
            caption: caption.map(str::to_string),
        });
        Ok(files.iter().map(|_| self.next_ref(chat_id)).collect())
    }

    async fn download_media(&self, file_ref: &str, dest: &Path) -> Result<PathBuf, TransportError> {
        self.record(Call::Download {
            file_ref: file_ref.to_string(),
            dest: dest.to_path_buf(),
        });
        std::fs::write(dest, b"custom-jpeg")?;
        Ok(dest.to_path_buf())
    }
}

#[derive(Default)]
pub struct FakeStore {
    prefs: Mutex<UserPreferences>,
    statuses: Mutex<Vec<(String, JobStatus)>>,
}

impl FakeStore {
    pub fn new(prefs: UserPreferences) -> Arc<Self> {
        Arc::new(Self {
            prefs: Mutex::new(prefs),
            statuses: Mutex::default(),
        })
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.statuses.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }
}

#[async_trait]
impl JobStore for FakeStore {
    async fn user_preferences(&self, _user_id: i64) -> AppResult<UserPreferences> {
        Ok(self.prefs.lock().unwrap().clone())
    }

    async fn url_record(&self, _url_id: &str) -> AppResult<Option<UrlRecord>> {
        Ok(None)
    }

    async fn set_url_status(&self, url_id: &str, status: JobStatus) -> AppResult<()> {
        self.statuses.lock().unwrap().push((url_id.to_string(), status));
        Ok(())
    }
}

/// Writes `size` bytes as `<job>.mp4` and reports it.
pub struct FakeBackend {
    pub size: usize,
    pub error: Option<DownloadError>,
    /// Cancelled after the file is written, as if the user pressed cancel mid-download
    pub cancel_during: Mutex<Option<CancellationToken>>,
    pub delay: Duration,
    pub fetches: AtomicUsize,
}

impl FakeBackend {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            error: None,
            cancel_during: Mutex::new(None),
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: DownloadError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(0)
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DownloadBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchReport, DownloadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let path = request.download_dir.join(format!("{}.mp4", request.job_id));
        if let Some(error) = &self.error {
            // a failed run still leaves its partial file behind
            std::fs::write(request.download_dir.join(format!("{}.mp4.part", request.job_id)), b"partial")
                .map_err(|e| DownloadError::Other(e.to_string()))?;
            return Err(error.clone());
        }
        std::fs::write(&path, vec![7u8; self.size]).map_err(|e| DownloadError::Other(e.to_string()))?;
        if let Some(token) = self.cancel_during.lock().unwrap().take() {
            token.cancel();
        }
        Ok(FetchReport {
            file_path: Some(path),
            title: Some("Test <Video>".to_string()),
            uploader: Some("uploader".to_string()),
            duration: Some(100.0),
        })
    }

    fn describe(&self, url: &str) -> Result<RemoteMedia, DownloadError> {
        Ok(RemoteMedia {
            title: format!("Remote {}", url),
            uploader: None,
            duration: Some(100.0),
            formats: vec![FormatOption {
                format_id: "bestvideo+bestaudio".to_string(),
                resolution: "Best Quality".to_string(),
                ext: "mp4".to_string(),
                filesize: None,
            }],
        })
    }
}

/// Same metadata for every path unless overridden.
pub struct FakeProber {
    pub fallback: MediaInfo,
    pub overrides: Mutex<HashMap<PathBuf, MediaInfo>>,
    pub keyframes: Vec<f64>,
}

impl FakeProber {
    pub fn new(duration: f64) -> Self {
        Self {
            fallback: MediaInfo {
                width: Some(1280),
                height: Some(720),
                duration,
                ..MediaInfo::default()
            },
            overrides: Mutex::default(),
            keyframes: Vec::new(),
        }
    }

    pub fn set(&self, path: impl Into<PathBuf>, info: MediaInfo) {
        self.overrides.lock().unwrap().insert(path.into(), info);
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, path: &Path) -> MediaInfo {
        self.overrides
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn keyframes(&self, _path: &Path) -> Vec<f64> {
        self.keyframes.clone()
    }
}

/// Writes `output_size` bytes to the last argument and records every invocation.
pub struct FakeFfmpeg {
    pub output_size: usize,
    /// Invocations whose arguments contain this text fail
    pub fail_matching: Option<String>,
    pub invocations: Mutex<Vec<Vec<String>>>,
}

impl FakeFfmpeg {
    pub fn new() -> Self {
        Self {
            output_size: 4096,
            fail_matching: None,
            invocations: Mutex::default(),
        }
    }

    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl FfmpegRunner for FakeFfmpeg {
    async fn run(&self, args: &[String], _timeout: Duration) -> Result<(), ProcessError> {
        self.invocations.lock().unwrap().push(args.to_vec());
        if let Some(pattern) = &self.fail_matching {
            if args.iter().any(|a| a.contains(pattern.as_str())) {
                return Err(ProcessError::Failed {
                    program: "ffmpeg".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "fake failure".to_string(),
                });
            }
        }
        let Some(output) = args.last() else {
            return Ok(());
        };
        std::fs::write(output, vec![0u8; self.output_size]).map_err(|e| ProcessError::Spawn {
            program: "ffmpeg".to_string(),
            source: e,
        })
    }
}

/// A pipeline over fakes, rooted in a temporary download directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub transport: Arc<FakeTransport>,
    pub store: Arc<FakeStore>,
    pub backend: Arc<FakeBackend>,
    pub prober: Arc<FakeProber>,
    pub ffmpeg: Arc<FakeFfmpeg>,
    pub registry: Arc<JobRegistry>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(backend: FakeBackend, prefs: UserPreferences, max_file_size: u64) -> Self {
        Self::with_tools(backend, prefs, max_file_size, FakeProber::new(100.0), FakeFfmpeg::new())
    }

    pub fn with_tools(
        backend: FakeBackend,
        prefs: UserPreferences,
        max_file_size: u64,
        prober: FakeProber,
        ffmpeg: FakeFfmpeg,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let store = FakeStore::new(prefs);
        let backend = Arc::new(backend);
        let prober = Arc::new(prober);
        let ffmpeg = Arc::new(ffmpeg);

        let config = PipelineConfig {
            max_file_size,
            screenshot_count: 4,
            sample_duration: 20.0,
            thumbnail_strategy: ThumbnailStrategy::Midpoint,
            thumbnail_dir: dir.path().join("thumbnails"),
        };
        let tools = MediaTools::new(prober.clone(), ffmpeg.clone());
        let pipeline = Pipeline::new(
            DownloadOrchestrator::new(backend.clone(), dir.path()),
            tools,
            transport.clone(),
            store.clone(),
            config,
        )
        .with_reporter(UploadReporter::with_interval(transport.clone(), Duration::from_millis(10)));

        Self {
            dir,
            transport,
            store,
            backend,
            prober,
            ffmpeg,
            registry: JobRegistry::new(),
            pipeline,
        }
    }

    /// Admits a job for `URL` and returns it with its ticket.
    pub fn admit(&self, url: &str) -> (Job, JobTicket) {
        let job_id = JobId::new();
        let ticket = self.registry.admit(job_id.clone(), USER_ID, "url-1").unwrap();
        let job = Job::new(job_id, USER_ID, CHAT_ID, "url-1", url, "best", ticket.token());
        (job, ticket)
    }

    pub fn status_message(&self) -> MessageRef {
        MessageRef {
            chat_id: CHAT_ID,
            message_id: 1,
        }
    }

    /// Regular files left anywhere under the download directory.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap().flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        walk(self.dir.path(), &mut out);
        out
    }
}

pub fn prefs_without_extras() -> UserPreferences {
    UserPreferences {
        generate_screenshots: false,
        generate_sample_video: false,
        ..UserPreferences::default()
    }
}
