//! Active-jobs registry.
//!
//! Two maps: job id -> entry and user id -> job id. The user map is the
//! admission gate; admitting takes its entry lock, so two concurrent
//! requests from one user cannot both get through.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::job::JobId;

#[derive(Debug, Clone)]
struct ActiveJob {
    user_id: i64,
    url_id: String,
    token: CancellationToken,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("user already has an active job ({0})")]
    Busy(JobId),
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, ActiveJob>,
    by_user: DashMap<i64, JobId>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `job_id` for `user_id` unless the user already has a job.
    ///
    /// The returned ticket unregisters the job when dropped.
    pub fn admit(self: &Arc<Self>, job_id: JobId, user_id: i64, url_id: &str) -> Result<JobTicket, AdmissionError> {
        match self.by_user.entry(user_id) {
            Entry::Occupied(active) => Err(AdmissionError::Busy(active.get().clone())),
            Entry::Vacant(slot) => {
                let token = CancellationToken::new();
                self.jobs.insert(
                    job_id.clone(),
                    ActiveJob {
                        user_id,
                        url_id: url_id.to_string(),
                        token: token.clone(),
                    },
                );
                slot.insert(job_id.clone());
                log::info!("job {} admitted for user {}", job_id, user_id);
                Ok(JobTicket {
                    registry: Arc::clone(self),
                    job_id,
                    token,
                })
            }
        }
    }

    pub fn is_busy(&self, user_id: i64) -> bool {
        self.by_user.contains_key(&user_id)
    }

    pub fn active_job(&self, user_id: i64) -> Option<JobId> {
        self.by_user.get(&user_id).map(|id| id.value().clone())
    }

    pub fn token(&self, job_id: &JobId) -> Option<CancellationToken> {
        self.jobs.get(job_id).map(|job| job.token.clone())
    }

    /// Sets the job's cancellation token. False if the job is not active.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.jobs.get(job_id) {
            Some(job) => {
                job.token.cancel();
                log::info!("job {} cancellation requested", job_id);
                true
            }
            None => false,
        }
    }

    /// Cancels `job_id` only if it belongs to `user_id`.
    pub fn cancel_owned(&self, job_id: &JobId, user_id: i64) -> bool {
        let owned = self.jobs.get(job_id).is_some_and(|job| job.user_id == user_id);
        owned && self.cancel(job_id)
    }

    /// Cancels whatever the user is running; returns the job id if there was one.
    pub fn cancel_for_user(&self, user_id: i64) -> Option<JobId> {
        let job_id = self.active_job(user_id)?;
        self.cancel(&job_id).then_some(job_id)
    }

    /// Cancels the user's job if it was started from `url_id`.
    pub fn cancel_for_url(&self, user_id: i64, url_id: &str) -> Option<JobId> {
        let job_id = self.active_job(user_id)?;
        let matches = self.jobs.get(&job_id).is_some_and(|job| job.url_id == url_id);
        (matches && self.cancel(&job_id)).then_some(job_id)
    }

    /// Unregisters `job_id`. Idempotent.
    pub fn remove(&self, job_id: &JobId) {
        if let Some((_, job)) = self.jobs.remove(job_id) {
            self.by_user.remove_if(&job.user_id, |_, active| active == job_id);
            log::debug!("job {} removed from registry", job_id);
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Proof of admission. Dropping it removes the job from the registry.
#[derive(Debug)]
pub struct JobTicket {
    registry: Arc<JobRegistry>,
    job_id: JobId,
    token: CancellationToken,
}

impl JobTicket {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        self.registry.remove(&self.job_id);
    }
}
