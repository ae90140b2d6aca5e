pub mod http;
pub mod poll;
pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use data_model::{
    ArchiveDescriptor,
    ArchiveId,
    DeletionStatus,
    JobId,
    JobStatus,
    RetrievalJob,
    StorageError,
};
use futures::{stream::BoxStream, StreamExt};
use metrics::{ArchiveStoreMetrics, KeyValue, Timed};
use tierstore_utils::checksum_hex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek};
use tracing::{info, warn};

pub use crate::{http::HttpArchiveTransport, poll::RetryPolicy};

const BODY_CHUNK_SIZE: usize = 64 * 1024;

/// Wire-level operations the archival store must provide. The workflow
/// depends only on this seam; credentials and request plumbing live in the
/// implementations.
#[async_trait]
pub trait ArchiveTransport: Send + Sync {
    async fn upload_archive(
        &self,
        vault: &str,
        description: &str,
        body: Bytes,
        checksum: &str,
    ) -> Result<ArchiveId, StorageError>;

    async fn initiate_retrieval_job(
        &self,
        vault: &str,
        archive_id: &ArchiveId,
    ) -> Result<JobId, StorageError>;

    async fn describe_job(&self, vault: &str, job_id: &JobId) -> Result<JobStatus, StorageError>;

    async fn get_job_output(
        &self,
        vault: &str,
        job_id: &JobId,
    ) -> Result<BoxStream<'static, Result<Bytes, StorageError>>, StorageError>;

    async fn delete_archive(
        &self,
        vault: &str,
        archive_id: &ArchiveId,
    ) -> Result<DeletionStatus, StorageError>;
}

/// Cold store client: archival upload with integrity verification and the
/// three-phase retrieval workflow (initiate job, poll status, fetch output).
///
/// Read-only after construction. Per-item workflow state lives in the
/// caller-owned [`RetrievalJob`], so the client is freely shareable across
/// tasks without locks. Every operation is a single store call: no hidden
/// retries, no local recovery; retry policy belongs to the caller.
#[derive(Clone)]
pub struct ArchiveStore {
    transport: Arc<dyn ArchiveTransport>,
    vault: String,
    metrics: ArchiveStoreMetrics,
}

impl ArchiveStore {
    pub fn new(transport: Arc<dyn ArchiveTransport>, vault: impl Into<String>) -> Self {
        Self {
            transport,
            vault: vault.into(),
            metrics: ArchiveStoreMetrics::new(),
        }
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    /// Archives the full content of `reader`.
    ///
    /// The checksum is computed first; the hasher rewinds the reader so the
    /// upload consumes the same stream from the start. The store re-derives
    /// the checksum at ingest and rejects a mismatch, which surfaces here
    /// as [`StorageError::IntegrityFailure`].
    #[tracing::instrument(skip_all, fields(vault = %self.vault, description = %description))]
    pub async fn upload<R>(
        &self,
        description: &str,
        reader: &mut R,
    ) -> Result<ArchiveDescriptor, StorageError>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin,
    {
        let checksum = checksum_hex(reader).await.map_err(StorageError::transport)?;
        let body = read_body(reader).await?;
        if body.is_empty() {
            return Err(StorageError::invalid_argument(
                "archive body must not be empty",
            ));
        }

        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "upload")]);
        let _timed = Timed::start(
            &self.metrics.operation_latency,
            vec![KeyValue::new("op", "upload")],
        );

        let archive_id = self
            .transport
            .upload_archive(&self.vault, description, body, &checksum)
            .await?;
        info!(archive_id = %archive_id, checksum = %checksum, "archive uploaded");
        Ok(ArchiveDescriptor {
            archive_id,
            checksum,
            description: description.to_string(),
        })
    }

    /// Requests an asynchronous retrieval job for an archive. Does not
    /// block for completion: the store owns job progress, and the returned
    /// job starts in `Requested`.
    #[tracing::instrument(skip_all, fields(vault = %self.vault, archive_id = %archive_id))]
    pub async fn initiate_retrieval(
        &self,
        archive_id: &ArchiveId,
    ) -> Result<RetrievalJob, StorageError> {
        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "initiate_retrieval")]);
        let job_id = self
            .transport
            .initiate_retrieval_job(&self.vault, archive_id)
            .await?;
        info!(job_id = %job_id, "retrieval job initiated");
        Ok(RetrievalJob::new(job_id, archive_id.clone()))
    }

    /// Single-shot, side-effect-free status read. Safe to call repeatedly
    /// and concurrently for the same job; polling cadence and backoff are
    /// the caller's concern (see [`ArchiveStore::wait_for_completion`]).
    ///
    /// A `Failed` observation is terminal: restart from
    /// [`ArchiveStore::initiate_retrieval`].
    #[tracing::instrument(skip_all, fields(vault = %self.vault, job_id = %job.job_id))]
    pub async fn poll_status(&self, job: &mut RetrievalJob) -> Result<JobStatus, StorageError> {
        if job.state() == data_model::RetrievalState::Fetched {
            return Err(StorageError::invalid_state(format!(
                "job {} output was already fetched",
                job.job_id
            )));
        }
        let status = self.transport.describe_job(&self.vault, &job.job_id).await?;
        job.observe(status)?;
        Ok(status)
    }

    /// Fetches the completed job's output, materialized fully in memory.
    ///
    /// Valid only after a poll observed `Succeeded`; anything else fails
    /// fast with [`StorageError::InvalidStateTransition`] before any store
    /// call. The job is single-use: a successful fetch consumes it.
    #[tracing::instrument(skip_all, fields(vault = %self.vault, job_id = %job.job_id))]
    pub async fn fetch_output(&self, job: &mut RetrievalJob) -> Result<Bytes, StorageError> {
        job.ensure_fetchable()?;

        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "fetch_output")]);
        let _timed = Timed::start(
            &self.metrics.operation_latency,
            vec![KeyValue::new("op", "fetch_output")],
        );

        let mut stream = self.transport.get_job_output(&self.vault, &job.job_id).await?;
        let mut output = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            output.extend_from_slice(&chunk?);
        }
        job.complete_fetch()?;
        self.metrics.fetched_bytes.add(output.len() as u64, &[]);
        info!(size_bytes = output.len(), "retrieval job output fetched");
        Ok(output.freeze())
    }

    /// Irreversible archive deletion. Returns the store's status signal:
    /// retention policy may defer or refuse the deletion, and interpreting
    /// that is up to the caller.
    #[tracing::instrument(skip_all, fields(vault = %self.vault, archive_id = %archive_id))]
    pub async fn delete(&self, archive_id: &ArchiveId) -> Result<DeletionStatus, StorageError> {
        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "delete")]);
        let status = self.transport.delete_archive(&self.vault, archive_id).await?;
        match status {
            DeletionStatus::Accepted => info!(%status, "archive deleted"),
            _ => warn!(%status, "archive deletion deferred or refused"),
        }
        Ok(status)
    }
}

async fn read_body<R>(reader: &mut R) -> Result<Bytes, StorageError>
where
    R: AsyncRead + Unpin,
{
    let mut body = BytesMut::new();
    let mut buf = vec![0u8; BODY_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(StorageError::transport)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Ok(body.freeze())
}
