//! Fetching remote media with an external downloader.

pub mod backend;
pub mod error;
pub mod orchestrator;
pub mod ytdlp;

pub use backend::{DownloadBackend, FetchReport, FetchRequest, FormatOption, RemoteMedia};
pub use error::DownloadError;
pub use orchestrator::{DownloadOrchestrator, DownloadOutcome, DownloadedMedia};
pub use ytdlp::YtDlpBackend;
