//! Façade over two tiers of remote blob storage.
//!
//! The hot tier ([`BlobStorage`]) is a low-latency, key-addressed object
//! store with immediate upload, copy, delete, listing and retrieval. The
//! cold tier ([`ArchiveStore`]) is a high-latency archival store: uploads
//! carry a client-computed SHA-256 the store verifies at ingest, and
//! retrieval runs through an asynchronous job protocol (initiate, poll,
//! fetch) because the backing medium is not immediately readable.
//!
//! Both tiers address uploads with keys derived by [`StorageKey::build`]
//! and tag them with MIME types resolved from an injected
//! [`ContentTypeTable`]. [`TieredStorage`] wires both tiers from a single
//! YAML config.

pub mod config;
pub mod service;

pub use archive_store::{
    testing,
    ArchiveStore,
    ArchiveTransport,
    HttpArchiveTransport,
    RetryPolicy,
};
pub use blob_store::{BlobStorage, BlobStorageConfig};
pub use data_model::{
    ArchiveDescriptor,
    ArchiveId,
    ContentTypeTable,
    DeletionStatus,
    FileCategory,
    JobId,
    JobStatus,
    RetrievalJob,
    RetrievalState,
    StorageError,
    StorageKey,
    FALLBACK_CONTENT_TYPE,
};

pub use crate::{
    config::{ArchiveConfig, TierStoreConfig},
    service::TieredStorage,
};
