use std::time::Duration;

use data_model::{JobStatus, RetrievalJob, StorageError};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ArchiveStore;

/// Backoff schedule for [`ArchiveStore::wait_for_completion`]. Archival
/// retrievals take minutes to hours, so the default starts at 30s and caps
/// at 15 minutes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_multiplier: f64,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl ArchiveStore {
    /// Caller-driven polling loop: repeats single-shot
    /// [`ArchiveStore::poll_status`] calls with exponential backoff until
    /// the job reaches a terminal status, or the token is cancelled first
    /// (`Ok(None)`).
    ///
    /// This is a convenience over `poll_status`, not a replacement:
    /// cadence lives here and only here, and callers with their own
    /// scheduler keep calling `poll_status` directly.
    pub async fn wait_for_completion(
        &self,
        job: &mut RetrievalJob,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Option<JobStatus>, StorageError> {
        let mut interval = policy.initial_interval;
        loop {
            if cancel.is_cancelled() {
                info!(job_id = %job.job_id, "retrieval wait cancelled");
                return Ok(None);
            }
            let status = self.poll_status(job).await?;
            if status.is_terminal() {
                return Ok(Some(status));
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(job_id = %job.job_id, "retrieval wait cancelled");
                    return Ok(None);
                }
                _ = tokio::time::sleep(interval) => {}
            }
            interval = interval
                .mul_f64(policy.backoff_multiplier)
                .min(policy.max_interval);
        }
    }
}
