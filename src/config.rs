use anyhow::Result;
use blob_store::BlobStorageConfig;
use data_model::ContentTypeTable;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Vault the archival store writes into.
    pub vault: String,
    /// Base URL of the archival gateway.
    pub endpoint: String,
    #[serde(default)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStoreConfig {
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    pub archive: ArchiveConfig,
    #[serde(default = "ContentTypeTable::common")]
    pub content_types: ContentTypeTable,
}

impl TierStoreConfig {
    pub fn from_path(path: &str) -> Result<TierStoreConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<TierStoreConfig> {
        let config: TierStoreConfig = Figment::new().merge(Yaml::string(config_str)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.archive.vault.trim().is_empty() {
            return Err(anyhow::anyhow!("archive vault name must not be empty"));
        }
        if Url::parse(&self.archive.endpoint).is_err() {
            return Err(anyhow::anyhow!(
                "invalid archive endpoint: {}",
                self.archive.endpoint
            ));
        }
        if Url::parse(&self.blob_storage.url).is_err() {
            return Err(anyhow::anyhow!(
                "invalid blob storage url: {}",
                self.blob_storage.url
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_config() {
        let config = TierStoreConfig::from_yaml(
            r#"
blob_storage:
  url: "s3://hot-bucket/objects"
  region: "us-east-1"
archive:
  vault: "cold-vault"
  endpoint: "https://archive.example.com"
  api_token: "secret"
content_types:
  ".pdf": "application/pdf"
"#,
        )
        .unwrap();

        assert_eq!(config.blob_storage.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.archive.vault, "cold-vault");
        assert_eq!(
            config.content_types.resolve("report.pdf").unwrap(),
            "application/pdf"
        );
    }

    #[test]
    fn test_content_types_default_to_common_table() {
        let config = TierStoreConfig::from_yaml(
            r#"
archive:
  vault: "cold-vault"
  endpoint: "https://archive.example.com"
"#,
        )
        .unwrap();
        assert_eq!(config.content_types.resolve("cat.png").unwrap(), "image/png");
    }

    #[test]
    fn test_rejects_empty_vault() {
        let err = TierStoreConfig::from_yaml(
            r#"
archive:
  vault: "  "
  endpoint: "https://archive.example.com"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("vault"));
    }

    #[test]
    fn test_rejects_unparseable_endpoint() {
        let err = TierStoreConfig::from_yaml(
            r#"
archive:
  vault: "cold-vault"
  endpoint: "not a url"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }
}
