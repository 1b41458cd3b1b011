//! Jobs: one URL-to-delivery run, its state machine and its bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod cleanup;
pub mod registry;

pub use cleanup::{ArtifactRole, CleanupSet, MediaFile};
pub use registry::{AdmissionError, JobRegistry, JobTicket};

/// Opaque job key. Also the prefix of every file the job writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Pipeline state. Stored as lowercase text in the URL records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Processing,
    Uploading,
    Screenshotting,
    Sampling,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Stages only move forward; failure and cancellation are reachable from
    /// any non-terminal state, completion only once the upload stage ran.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Failed | Cancelled => true,
            Pending => false,
            Downloading => self == Pending,
            Processing => self == Downloading,
            Uploading => self == Processing,
            Screenshotting => self == Uploading,
            Sampling => matches!(self, Uploading | Screenshotting),
            Completed => matches!(self, Uploading | Screenshotting | Sampling),
        }
    }
}

/// One pipeline run for one user.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub user_id: i64,
    pub chat_id: i64,
    /// Stored URL record this job was started from
    pub url_id: String,
    pub url: String,
    pub format_id: String,
    pub cancel: CancellationToken,
    status: JobStatus,
}

impl Job {
    pub fn new(
        id: JobId,
        user_id: i64,
        chat_id: i64,
        url_id: impl Into<String>,
        url: impl Into<String>,
        format_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            user_id,
            chat_id,
            url_id: url_id.into(),
            url: url.into(),
            format_id: format_id.into(),
            cancel,
            status: JobStatus::Pending,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Moves to `next` if the state machine allows it.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.can_transition_to(next) {
            log::debug!("job {}: {} -> {}", self.id, self.status, next);
            self.status = next;
            true
        } else {
            log::warn!("job {}: ignored transition {} -> {}", self.id, self.status, next);
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
