pub mod content_type;
pub mod error;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub use crate::{
    content_type::{ContentTypeTable, FALLBACK_CONTENT_TYPE},
    error::StorageError,
};

/// Hierarchical object key of the form `{category}/{timestamp}/{name}`.
///
/// Built once at upload time and immutable afterwards; it is the sole
/// addressing handle for copy, delete and fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Builds a key from its three segments. Pure and deterministic in its
    /// inputs; uniqueness comes from the timestamp the caller supplies.
    ///
    /// `name` is not escaped or normalized. A name containing `/` produces
    /// extra key segments; callers that need unambiguous segments must not
    /// pass separator characters.
    pub fn build(
        category: impl AsRef<str>,
        name: &str,
        timestamp_ms: u64,
    ) -> Result<Self, StorageError> {
        if name.trim().is_empty() {
            return Err(StorageError::invalid_argument(
                "file name must not be empty",
            ));
        }
        Ok(Self(format!(
            "{}/{}/{}",
            category.as_ref(),
            timestamp_ms,
            name
        )))
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StorageKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StorageKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ready-made classification tags for callers that don't bring their own.
/// Any `impl AsRef<str>` works as a category; the key scheme only uses the
/// canonical string form.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum FileCategory {
    Images,
    Documents,
    Videos,
    Audio,
    Backups,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveId(String);

impl ArchiveId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArchiveId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One item submitted to cold storage.
///
/// The archive id is the only handle needed for later deletion or
/// retrieval-job initiation. The checksum is the client-computed ingest
/// token; it is never re-verified by this layer after upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    pub archive_id: ArchiveId,
    pub checksum: String,
    pub description: String,
}

/// Store-reported status of a retrieval job.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
)]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Store-reported outcome of an archive deletion. Not a boolean: deletion
/// may be deferred or refused by store-side retention policy, and the
/// caller must interpret the signal.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
)]
pub enum DeletionStatus {
    Accepted,
    Pending,
    Rejected,
}

/// Local workflow state of one archival item's retrieval.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::AsRefStr, strum::Display,
)]
pub enum RetrievalState {
    /// Retrieval job accepted by the store, no status observed yet.
    Requested,
    /// Last observed status was non-terminal.
    Pending,
    /// The store reported the job succeeded; output can be fetched.
    Succeeded,
    /// Terminal. Restart from a fresh retrieval job.
    Failed,
    /// Output was consumed. The job is single-use; no re-fetch contract.
    Fetched,
}

/// One in-flight or completed retrieval request against cold storage.
///
/// The store owns job progress; this descriptor only folds observed
/// statuses into the local state machine
/// (`Requested → Pending → Succeeded → Fetched`, terminal `Failed`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalJob {
    pub job_id: JobId,
    pub archive_id: ArchiveId,
    state: RetrievalState,
}

impl RetrievalJob {
    pub fn new(job_id: JobId, archive_id: ArchiveId) -> Self {
        Self {
            job_id,
            archive_id,
            state: RetrievalState::Requested,
        }
    }

    pub fn state(&self) -> RetrievalState {
        self.state
    }

    /// Folds a store-reported status into the local machine.
    ///
    /// Fails once the output has been fetched: the descriptor is spent and
    /// must not be resurrected by a late poll.
    pub fn observe(&mut self, status: JobStatus) -> Result<RetrievalState, StorageError> {
        if self.state == RetrievalState::Fetched {
            return Err(StorageError::invalid_state(format!(
                "job {} output was already fetched",
                self.job_id
            )));
        }
        self.state = match status {
            JobStatus::InProgress => RetrievalState::Pending,
            JobStatus::Succeeded => RetrievalState::Succeeded,
            JobStatus::Failed => RetrievalState::Failed,
        };
        Ok(self.state)
    }

    /// Guards output retrieval: only a job observed as succeeded may fetch.
    pub fn ensure_fetchable(&self) -> Result<(), StorageError> {
        if self.state != RetrievalState::Succeeded {
            return Err(StorageError::invalid_state(format!(
                "job {} is {}, output can only be fetched after polling observes {}",
                self.job_id,
                self.state,
                JobStatus::Succeeded
            )));
        }
        Ok(())
    }

    /// Marks the single-use output as consumed.
    pub fn complete_fetch(&mut self) -> Result<(), StorageError> {
        self.ensure_fetchable()?;
        self.state = RetrievalState::Fetched;
        Ok(())
    }
}
