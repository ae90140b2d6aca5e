//! Deterministic in-memory archival store for tests.
//!
//! Jobs never advance on their own: a test drives progress with
//! [`InMemoryArchiveTransport::complete_job`] / `fail_job`, which keeps the
//! workflow's observable transitions fully under the test's control.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use data_model::{ArchiveId, DeletionStatus, JobId, JobStatus, StorageError};
use futures::{stream, stream::BoxStream};
use tierstore_utils::sha256_hex;

use crate::ArchiveTransport;

struct StoredArchive {
    body: Bytes,
    description: String,
}

struct StoredJob {
    archive_id: ArchiveId,
    status: JobStatus,
}

#[derive(Default)]
struct Inner {
    archives: HashMap<String, StoredArchive>,
    jobs: HashMap<String, StoredJob>,
    deletion_status: Option<DeletionStatus>,
    upload_calls: usize,
    output_calls: usize,
}

#[derive(Default)]
pub struct InMemoryArchiveTransport {
    inner: Mutex<Inner>,
}

impl InMemoryArchiveTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances a job to `Succeeded`, as the store would once the archive
    /// is staged for download.
    pub fn complete_job(&self, job_id: &JobId) {
        if let Some(job) = self.inner.lock().unwrap().jobs.get_mut(job_id.get()) {
            job.status = JobStatus::Succeeded;
        }
    }

    pub fn fail_job(&self, job_id: &JobId) {
        if let Some(job) = self.inner.lock().unwrap().jobs.get_mut(job_id.get()) {
            job.status = JobStatus::Failed;
        }
    }

    /// Overrides the status reported for subsequent deletions, emulating
    /// store-side retention policy.
    pub fn set_deletion_status(&self, status: DeletionStatus) {
        self.inner.lock().unwrap().deletion_status = Some(status);
    }

    pub fn description(&self, archive_id: &ArchiveId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .archives
            .get(archive_id.get())
            .map(|archive| archive.description.clone())
    }

    pub fn upload_calls(&self) -> usize {
        self.inner.lock().unwrap().upload_calls
    }

    pub fn output_calls(&self) -> usize {
        self.inner.lock().unwrap().output_calls
    }
}

#[async_trait]
impl ArchiveTransport for InMemoryArchiveTransport {
    async fn upload_archive(
        &self,
        _vault: &str,
        description: &str,
        body: Bytes,
        checksum: &str,
    ) -> Result<ArchiveId, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.upload_calls += 1;
        let computed = sha256_hex(&body);
        if computed != checksum {
            return Err(StorageError::integrity_failure(
                checksum,
                format!("store computed {}", computed),
            ));
        }
        let archive_id = ArchiveId::new(nanoid::nanoid!());
        inner.archives.insert(
            archive_id.get().to_string(),
            StoredArchive {
                body,
                description: description.to_string(),
            },
        );
        Ok(archive_id)
    }

    async fn initiate_retrieval_job(
        &self,
        _vault: &str,
        archive_id: &ArchiveId,
    ) -> Result<JobId, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.archives.contains_key(archive_id.get()) {
            return Err(StorageError::invalid_state(format!(
                "unknown archive id {}",
                archive_id
            )));
        }
        let job_id = JobId::new(nanoid::nanoid!());
        inner.jobs.insert(
            job_id.get().to_string(),
            StoredJob {
                archive_id: archive_id.clone(),
                status: JobStatus::InProgress,
            },
        );
        Ok(job_id)
    }

    async fn describe_job(&self, _vault: &str, job_id: &JobId) -> Result<JobStatus, StorageError> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .get(job_id.get())
            .map(|job| job.status)
            .ok_or_else(|| StorageError::invalid_state(format!("unknown job id {}", job_id)))
    }

    async fn get_job_output(
        &self,
        _vault: &str,
        job_id: &JobId,
    ) -> Result<BoxStream<'static, Result<Bytes, StorageError>>, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.output_calls += 1;
        let job = inner
            .jobs
            .get(job_id.get())
            .ok_or_else(|| StorageError::invalid_state(format!("unknown job id {}", job_id)))?;
        if job.status != JobStatus::Succeeded {
            return Err(StorageError::invalid_state(format!(
                "job {} output is not ready",
                job_id
            )));
        }
        let body = inner
            .archives
            .get(job.archive_id.get())
            .ok_or_else(|| {
                StorageError::invalid_state(format!("archive {} was deleted", job.archive_id))
            })?
            .body
            .clone();
        // chunked so the workflow's bounded-read accumulation is exercised
        let chunks: Vec<Result<Bytes, StorageError>> = body
            .chunks(1024)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn delete_archive(
        &self,
        _vault: &str,
        archive_id: &ArchiveId,
    ) -> Result<DeletionStatus, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.archives.remove(archive_id.get()).is_none() {
            return Err(StorageError::invalid_state(format!(
                "unknown archive id {}",
                archive_id
            )));
        }
        Ok(inner.deletion_status.unwrap_or(DeletionStatus::Accepted))
    }
}
