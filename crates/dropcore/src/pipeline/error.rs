use thiserror::Error;

use crate::download::DownloadError;
use crate::job::JobStatus;
use crate::pipeline::messages;

/// Why a job ended without completing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any work started
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("download failed: {0}")]
    DownloadFailure(#[from] DownloadError),

    #[error("cancelled during {stage}")]
    Cancelled { stage: JobStatus },

    /// The original file is unusable
    #[error("processing failed: {0}")]
    ProcessingFailure(String),

    /// No part could be uploaded
    #[error("upload failed: {0}")]
    UploadFailure(String),

    /// Panic or store failure caught at the controller boundary
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl PipelineError {
    pub fn terminal_status(&self) -> JobStatus {
        match self {
            PipelineError::Cancelled { .. } => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    /// Status text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidInput(msg) => format!("❌ Invalid input: {}", crate::core::escape_html(msg)),
            PipelineError::DownloadFailure(e) => messages::download_failed(e.message()),
            PipelineError::Cancelled {
                stage: JobStatus::Pending | JobStatus::Downloading,
            } => messages::DOWNLOAD_CANCELLED.to_string(),
            PipelineError::Cancelled { stage } => messages::cancelled_at(&stage.to_string()),
            PipelineError::ProcessingFailure(msg) | PipelineError::UploadFailure(msg) => messages::generic_error(msg),
            PipelineError::Unexpected(_) => messages::generic_error("internal error, please try again later"),
        }
    }
}
