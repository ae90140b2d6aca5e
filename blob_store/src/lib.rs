use std::{collections::BTreeMap, env, sync::Arc};

use anyhow::anyhow;
use bytes::{Bytes, BytesMut};
use data_model::{ContentTypeTable, StorageError, StorageKey};
use futures::{stream::BoxStream, StreamExt};
use metrics::{BlobStoreMetrics, KeyValue, Timed};
use object_store::{
    aws::AmazonS3Builder,
    parse_url,
    path::Path,
    Attribute,
    Attributes,
    ObjectStore,
    ObjectStoreScheme,
    PutOptions,
    PutPayload,
    TagSet,
};
use serde::{Deserialize, Serialize};
use tierstore_utils::MonotonicClock;
use tokio::{io::AsyncWriteExt, sync::mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;
use url::Url;

/// Browser cache lifetime attached to uploaded objects: 30 days.
const CACHE_CONTROL: &str = "max-age=2592000, must-revalidate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    pub url: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        let url = format!(
            "file://{}",
            env::current_dir()
                .unwrap()
                .join("tierstore_storage/blobs")
                .to_str()
                .unwrap()
        );
        info!("using blob storage url: {}", url);
        BlobStorageConfig { url, region: None }
    }
}

/// Hot store client: immediate, key-addressed CRUD over an object store.
///
/// Every upload derives a fresh key from a process-monotonic tick, so
/// repeated uploads of the same `(category, name)` never overwrite each
/// other.
#[derive(Clone)]
pub struct BlobStorage {
    object_store: Arc<dyn ObjectStore>,
    root: Path,
    base_url: String,
    attach_attributes: bool,
    content_types: ContentTypeTable,
    clock: Arc<MonotonicClock>,
    metrics: BlobStoreMetrics,
}

impl BlobStorage {
    pub fn new(
        config: BlobStorageConfig,
        content_types: ContentTypeTable,
    ) -> Result<Self, StorageError> {
        let url = Url::parse(&config.url).map_err(|e| {
            StorageError::invalid_argument(format!("invalid blob storage url {}: {}", config.url, e))
        })?;
        let (scheme, _) = ObjectStoreScheme::parse(&url).map_err(|e| {
            StorageError::invalid_argument(format!(
                "unsupported blob storage url {}: {}",
                config.url, e
            ))
        })?;
        let (object_store, root) = build_object_store(&url, &scheme, &config)?;
        info!(url = %config.url, "initialized blob storage");
        Ok(Self {
            object_store: Arc::from(object_store),
            root,
            base_url: config.url.trim_end_matches('/').to_string(),
            // local backends reject object attributes and tags
            attach_attributes: matches!(scheme, ObjectStoreScheme::AmazonS3),
            content_types,
            clock: Arc::new(MonotonicClock::new()),
            metrics: BlobStoreMetrics::new(),
        })
    }

    /// Uploads `bytes` under a freshly derived key and returns that key.
    ///
    /// The object is tagged with the MIME type resolved from `name` and a
    /// 30 day cache lifetime. `is_public` marks the object for
    /// unauthenticated read via an object tag that bucket policy can act
    /// on.
    #[tracing::instrument(skip_all, fields(category = %category.as_ref(), name = %name))]
    pub async fn upload(
        &self,
        category: impl AsRef<str>,
        name: &str,
        bytes: Bytes,
        is_public: bool,
    ) -> Result<StorageKey, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::invalid_argument(
                "upload buffer must not be empty",
            ));
        }
        let key = StorageKey::build(category, name, self.clock.tick())?;
        let content_type = self.content_types.resolve(name)?.to_string();

        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "upload")]);
        let _timed = Timed::start(
            &self.metrics.operation_latency,
            vec![KeyValue::new("op", "upload")],
        );

        let opts = if self.attach_attributes {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.clone().into());
            attributes.insert(Attribute::CacheControl, CACHE_CONTROL.into());
            let mut tags = TagSet::default();
            if is_public {
                tags.push("public", "true");
            }
            PutOptions {
                attributes,
                tags,
                ..Default::default()
            }
        } else {
            PutOptions::default()
        };

        let size_bytes = bytes.len();
        self.object_store
            .put_opts(&self.object_path(key.get()), PutPayload::from(bytes), opts)
            .await
            .map_err(StorageError::transport)?;
        info!(key = %key, size_bytes, content_type = %content_type, "uploaded object");
        Ok(key)
    }

    /// Store-side copy to a freshly derived destination key.
    #[tracing::instrument(skip_all, fields(source_key = %source_key, name = %dest_name))]
    pub async fn copy(
        &self,
        dest_category: impl AsRef<str>,
        dest_name: &str,
        source_key: &StorageKey,
    ) -> Result<StorageKey, StorageError> {
        if source_key.get().trim().is_empty() {
            return Err(StorageError::invalid_argument(
                "source key must not be empty",
            ));
        }
        let dest_key = StorageKey::build(dest_category, dest_name, self.clock.tick())?;
        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "copy")]);
        let _timed = Timed::start(
            &self.metrics.operation_latency,
            vec![KeyValue::new("op", "copy")],
        );
        self.object_store
            .copy(
                &self.object_path(source_key.get()),
                &self.object_path(dest_key.get()),
            )
            .await
            .map_err(StorageError::transport)?;
        Ok(dest_key)
    }

    #[tracing::instrument(skip_all, fields(key = %key))]
    pub async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "delete")]);
        self.object_store
            .delete(&self.object_path(key.get()))
            .await
            .map_err(StorageError::transport)?;
        Ok(())
    }

    /// All objects under `prefix`, mapped key → etag. The etag is empty
    /// when the backend reports none.
    pub async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>, StorageError> {
        self.metrics
            .operations
            .add(1, &[KeyValue::new("op", "list")]);
        let prefix_path = self.object_path(prefix);
        let mut stream = self.object_store.list(Some(&prefix_path));
        let mut entries = BTreeMap::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(StorageError::transport)?;
            entries.insert(
                self.relative_key(&meta.location),
                meta.e_tag.unwrap_or_default(),
            );
        }
        Ok(entries)
    }

    /// Streaming read of one object.
    pub async fn get(
        &self,
        key: &StorageKey,
    ) -> Result<BoxStream<'static, Result<Bytes, StorageError>>, StorageError> {
        let path = self.object_path(key.get());
        let get_result = self
            .object_store
            .get(&path)
            .await
            .map_err(|e| StorageError::transport(anyhow!("can't get object {:?}: {:?}", path, e)))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let key = key.clone();
        tokio::spawn(async move {
            let mut stream = get_result.into_stream();
            while let Some(chunk) = stream.next().await {
                let _ = tx.send(chunk.map_err(|e| {
                    StorageError::transport(anyhow!("error reading object {:?}: {:?}", key, e))
                }));
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    /// Full in-memory fetch of one object.
    pub async fn read_bytes(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        let _timed = Timed::start(
            &self.metrics.operation_latency,
            vec![KeyValue::new("op", "read_bytes")],
        );
        let mut reader = self.get(key).await?;
        let mut bytes = BytesMut::new();
        while let Some(chunk) = reader.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes.into())
    }

    /// Fetch of one object into a local file.
    pub async fn download_to_path(
        &self,
        key: &StorageKey,
        path: &std::path::Path,
    ) -> Result<(), StorageError> {
        let mut reader = self.get(key).await?;
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(StorageError::transport)?;
        while let Some(chunk) = reader.next().await {
            file.write_all(&chunk?)
                .await
                .map_err(StorageError::transport)?;
        }
        file.flush().await.map_err(StorageError::transport)?;
        Ok(())
    }

    /// Public location of an object: `{storage url}/{key}`.
    pub fn url_for(&self, key: &StorageKey) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn object_path(&self, key: &str) -> Path {
        if self.root.as_ref().is_empty() {
            Path::from(key)
        } else {
            Path::from(format!("{}/{}", self.root.as_ref(), key))
        }
    }

    fn relative_key(&self, location: &Path) -> String {
        let location = location.as_ref();
        let root = self.root.as_ref();
        if root.is_empty() {
            return location.to_string();
        }
        location
            .strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .unwrap_or_else(|| location.to_string())
    }
}

fn build_object_store(
    url: &Url,
    scheme: &ObjectStoreScheme,
    config: &BlobStorageConfig,
) -> Result<(Box<dyn ObjectStore>, Path), StorageError> {
    match scheme {
        ObjectStoreScheme::AmazonS3 => {
            let mut builder = AmazonS3Builder::from_env().with_url(url.to_string());
            if let Some(region) = &config.region {
                builder = builder.with_region(region.clone());
            }
            // For supporting localstack/minio for testing
            if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
                if endpoint.starts_with("http://") {
                    builder = builder.with_allow_http(true);
                }
                builder = builder.with_endpoint(endpoint);
            }
            let store = builder.build().map_err(StorageError::transport)?;
            let (_, path) = parse_url(url).map_err(StorageError::transport)?;
            Ok((Box::new(store), path))
        }
        _ => parse_url(url).map_err(StorageError::transport),
    }
}

#[cfg(test)]
mod tests {
    use data_model::FileCategory;

    use super::*;

    fn test_storage(temp_dir: &tempfile::TempDir) -> BlobStorage {
        let config = BlobStorageConfig {
            url: format!(
                "file://{}",
                temp_dir.path().join("blobs").to_str().unwrap()
            ),
            region: None,
        };
        BlobStorage::new(config, ContentTypeTable::common()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_read_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let payload = Bytes::from_static(b"a hot payload");
        let key = storage
            .upload(FileCategory::Images, "cat.png", payload.clone(), false)
            .await
            .unwrap();

        assert!(key.get().starts_with("images/"));
        assert!(key.get().ends_with("/cat.png"));
        assert_eq!(storage.read_bytes(&key).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_repeated_uploads_never_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let first = storage
            .upload("images", "cat.png", Bytes::from_static(b"one"), false)
            .await
            .unwrap();
        let second = storage
            .upload("images", "cat.png", Bytes::from_static(b"two"), false)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(storage.read_bytes(&first).await.unwrap().as_ref(), b"one");
        assert_eq!(storage.read_bytes(&second).await.unwrap().as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_arguments_without_writing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let err = storage
            .upload("images", "  ", Bytes::from_static(b"data"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument { .. }));

        let err = storage
            .upload("images", "cat.png", Bytes::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument { .. }));

        assert!(storage.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        storage
            .upload("images", "a.png", Bytes::from_static(b"a"), false)
            .await
            .unwrap();
        storage
            .upload("images", "b.png", Bytes::from_static(b"b"), false)
            .await
            .unwrap();
        storage
            .upload("documents", "c.pdf", Bytes::from_static(b"c"), false)
            .await
            .unwrap();

        let entries = storage.list("images").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.keys().all(|key| key.starts_with("images/")));

        assert_eq!(storage.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_copy_addresses_a_new_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let payload = Bytes::from_static(b"original");
        let source = storage
            .upload("documents", "report.pdf", payload.clone(), false)
            .await
            .unwrap();
        let copy = storage
            .copy("backups", "report.pdf", &source)
            .await
            .unwrap();

        assert_ne!(source, copy);
        assert!(copy.get().starts_with("backups/"));
        assert_eq!(storage.read_bytes(&copy).await.unwrap(), payload);
        assert_eq!(storage.read_bytes(&source).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let key = storage
            .upload("images", "gone.png", Bytes::from_static(b"bye"), false)
            .await
            .unwrap();
        storage.delete(&key).await.unwrap();

        let err = storage.read_bytes(&key).await.unwrap_err();
        assert!(matches!(err, StorageError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_download_to_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let payload = Bytes::from_static(b"file bound payload");
        let key = storage
            .upload("documents", "note.txt", payload.clone(), false)
            .await
            .unwrap();

        let target = temp_dir.path().join("note.txt");
        storage.download_to_path(&key, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_url_for_joins_base_and_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&temp_dir);

        let key = StorageKey::from("images/1000/cat.png");
        let url = storage.url_for(&key);
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/images/1000/cat.png"));
    }
}
