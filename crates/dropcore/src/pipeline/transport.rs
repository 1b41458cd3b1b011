//! The chat platform, as the pipeline sees it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::utils::extension_lower;
use crate::pipeline::progress::UploadProgress;
use crate::storage::UploadMode;

/// Containers the platform can stream inline.
pub const STREAMABLE_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "webm"];

/// A sent message that can later be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// How a single file goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Streamable video with duration/size hints
    Video,
    Document,
}

impl UploadKind {
    /// Video only when the user asked for video and the container is streamable.
    pub fn for_file(mode: UploadMode, path: &Path) -> Self {
        let streamable = extension_lower(path).is_some_and(|ext| STREAMABLE_EXTENSIONS.contains(&ext.as_str()));
        if mode == UploadMode::Video && streamable {
            UploadKind::Video
        } else {
            UploadKind::Document
        }
    }
}

/// One file upload with its presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub path: PathBuf,
    /// HTML caption
    pub caption: String,
    pub kind: UploadKind,
    pub thumbnail: Option<PathBuf>,
    /// Whole seconds
    pub duration: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaUpload {
    pub fn new(path: impl Into<PathBuf>, caption: impl Into<String>, kind: UploadKind) -> Self {
        Self {
            path: path.into(),
            caption: caption.into(),
            kind,
            thumbnail: None,
            duration: None,
            width: None,
            height: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform rejected the request; the text is the platform's own.
    #[error("{0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chat client operations the pipeline uses. Message texts are HTML.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, TransportError>;

    /// Editing to identical text must succeed without doing anything.
    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), TransportError>;

    /// Uploads one file, feeding `progress` as bytes leave.
    async fn send_media(
        &self,
        chat_id: i64,
        upload: &MediaUpload,
        progress: UploadProgress,
    ) -> Result<MessageRef, TransportError>;

    /// Photo album; `caption` goes on the first item.
    async fn send_media_group(
        &self,
        chat_id: i64,
        photos: &[PathBuf],
        caption: Option<&str>,
    ) -> Result<Vec<MessageRef>, TransportError>;

    /// Fetches a platform file reference into `dest`.
    async fn download_media(&self, file_ref: &str, dest: &Path) -> Result<PathBuf, TransportError>;
}
