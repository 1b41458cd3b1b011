use std::path::PathBuf;

use crate::job::{JobId, JobStatus};
use crate::pipeline::transport::MessageRef;

/// Outcome of one part's upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadResult {
    Sent(MessageRef),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartOutcome {
    /// 1-based
    pub index: usize,
    pub path: PathBuf,
    pub result: UploadResult,
}

/// What a finished job did.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub parts: Vec<PartOutcome>,
    pub screenshots_sent: usize,
    pub sample_sent: bool,
    pub error: Option<String>,
    /// Stages the job entered, in order
    pub stages: Vec<JobStatus>,
}

impl JobReport {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            parts: Vec::new(),
            screenshots_sent: 0,
            sample_sent: false,
            error: None,
            stages: vec![JobStatus::Pending],
        }
    }

    pub fn sent_parts(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p.result, UploadResult::Sent(_)))
            .count()
    }

    pub fn entered(&self, stage: JobStatus) -> bool {
        self.stages.contains(&stage)
    }
}
