use std::sync::Arc;

use archive_store::{ArchiveStore, ArchiveTransport, HttpArchiveTransport};
use blob_store::BlobStorage;
use data_model::StorageError;
use tracing::info;

use crate::config::TierStoreConfig;

/// Façade wiring both storage tiers from one config: a hot, key-addressed
/// object store and a cold, job-based archival store.
pub struct TieredStorage {
    blob: BlobStorage,
    archive: ArchiveStore,
}

impl TieredStorage {
    pub fn new(config: TierStoreConfig) -> Result<Self, StorageError> {
        let transport = Arc::new(HttpArchiveTransport::new(
            config.archive.endpoint.clone(),
            config.archive.api_token.clone(),
        ));
        Self::with_archive_transport(config, transport)
    }

    /// Builds the façade with a caller-supplied archive transport, for
    /// embedders with their own gateway client and for tests.
    pub fn with_archive_transport(
        config: TierStoreConfig,
        transport: Arc<dyn ArchiveTransport>,
    ) -> Result<Self, StorageError> {
        config
            .validate()
            .map_err(|e| StorageError::invalid_argument(e.to_string()))?;
        let blob = BlobStorage::new(config.blob_storage, config.content_types)?;
        let archive = ArchiveStore::new(transport, config.archive.vault);
        info!(vault = %archive.vault(), "tiered storage initialized");
        Ok(Self { blob, archive })
    }

    /// Hot tier: immediate, key-addressed CRUD.
    pub fn blob(&self) -> &BlobStorage {
        &self.blob
    }

    /// Cold tier: archival upload and job-based retrieval.
    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }
}

impl std::fmt::Debug for TieredStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStorage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use archive_store::testing::InMemoryArchiveTransport;
    use bytes::Bytes;
    use data_model::{FileCategory, JobStatus, RetrievalState};

    use super::*;

    fn test_config(temp_dir: &tempfile::TempDir) -> TierStoreConfig {
        TierStoreConfig::from_yaml(&format!(
            r#"
blob_storage:
  url: "file://{}"
archive:
  vault: "test-vault"
  endpoint: "https://archive.example.com"
"#,
            temp_dir.path().join("blobs").to_str().unwrap()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_hot_tier_round_trip_through_facade() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = TieredStorage::with_archive_transport(
            test_config(&temp_dir),
            Arc::new(InMemoryArchiveTransport::new()),
        )
        .unwrap();

        let payload = Bytes::from_static(b"facade payload");
        let key = storage
            .blob()
            .upload(FileCategory::Images, "cat.png", payload.clone(), false)
            .await
            .unwrap();
        assert_eq!(storage.blob().read_bytes(&key).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_cold_tier_workflow_through_facade() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(InMemoryArchiveTransport::new());
        let storage =
            TieredStorage::with_archive_transport(test_config(&temp_dir), transport.clone())
                .unwrap();

        let payload = b"archived through the facade".to_vec();
        let descriptor = storage
            .archive()
            .upload("facade archive", &mut Cursor::new(payload.clone()))
            .await
            .unwrap();

        let mut job = storage
            .archive()
            .initiate_retrieval(&descriptor.archive_id)
            .await
            .unwrap();
        assert_eq!(
            storage.archive().poll_status(&mut job).await.unwrap(),
            JobStatus::InProgress
        );

        transport.complete_job(&job.job_id);
        assert_eq!(
            storage.archive().poll_status(&mut job).await.unwrap(),
            JobStatus::Succeeded
        );
        assert_eq!(job.state(), RetrievalState::Succeeded);

        let output = storage.archive().fetch_output(&mut job).await.unwrap();
        assert_eq!(output, payload);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = TierStoreConfig::from_yaml(
            r#"
archive:
  vault: "test-vault"
  endpoint: "https://archive.example.com"
"#,
        )
        .unwrap();
        config.archive.vault = String::new();

        let err = TieredStorage::with_archive_transport(
            config,
            Arc::new(InMemoryArchiveTransport::new()),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument { .. }));
    }
}
