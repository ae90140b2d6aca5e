//! reqwest transport for a vault-style archival REST gateway.
//!
//! Endpoints, relative to the configured base:
//!   POST   /vaults/{vault}/archives          body + checksum header → archive id
//!   POST   /vaults/{vault}/jobs              archive-retrieval job → job id
//!   GET    /vaults/{vault}/jobs/{job}        job description (status)
//!   GET    /vaults/{vault}/jobs/{job}/output completed job output bytes
//!   DELETE /vaults/{vault}/archives/{id}     deletion status
//!
//! The gateway reports checksum rejection as 400 `checksum-mismatch` and
//! unknown ids as 404; both are mapped onto the shared error taxonomy.

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use data_model::{ArchiveId, DeletionStatus, JobId, JobStatus, StorageError};
use futures::{stream::BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::ArchiveTransport;

const DESCRIPTION_HEADER: &str = "x-archive-description";
const CHECKSUM_HEADER: &str = "x-content-sha256";
const CHECKSUM_MISMATCH: &str = "checksum-mismatch";

#[derive(Deserialize)]
struct UploadResponse {
    archive_id: String,
}

#[derive(Deserialize)]
struct InitiateJobResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct JobDescription {
    status: JobStatus,
}

#[derive(Deserialize)]
struct DeleteResponse {
    status: DeletionStatus,
}

#[derive(Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    checksum: Option<String>,
}

pub struct HttpArchiveTransport {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpArchiveTransport {
    pub fn new(endpoint: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::invalid_state(
                "archive store does not know this id",
            ));
        }
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.error == CHECKSUM_MISMATCH {
            return Err(StorageError::integrity_failure(
                body.checksum.unwrap_or_default(),
                body.message,
            ));
        }
        Err(StorageError::transport(anyhow!(
            "archive store returned {}: {} {}",
            status,
            body.error,
            body.message
        )))
    }
}

#[async_trait]
impl ArchiveTransport for HttpArchiveTransport {
    async fn upload_archive(
        &self,
        vault: &str,
        description: &str,
        body: Bytes,
        checksum: &str,
    ) -> Result<ArchiveId, StorageError> {
        let request = self
            .client
            .post(format!("{}/vaults/{}/archives", self.endpoint, vault))
            .header(DESCRIPTION_HEADER, description)
            .header(CHECKSUM_HEADER, checksum)
            .body(body);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let payload: UploadResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(StorageError::transport)?;
        Ok(ArchiveId::new(payload.archive_id))
    }

    async fn initiate_retrieval_job(
        &self,
        vault: &str,
        archive_id: &ArchiveId,
    ) -> Result<JobId, StorageError> {
        let request = self
            .client
            .post(format!("{}/vaults/{}/jobs", self.endpoint, vault))
            .json(&serde_json::json!({
                "type": "archive-retrieval",
                "archive_id": archive_id.get(),
            }));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let payload: InitiateJobResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(StorageError::transport)?;
        Ok(JobId::new(payload.job_id))
    }

    async fn describe_job(&self, vault: &str, job_id: &JobId) -> Result<JobStatus, StorageError> {
        let request = self
            .client
            .get(format!("{}/vaults/{}/jobs/{}", self.endpoint, vault, job_id));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let description: JobDescription = Self::check(response)
            .await?
            .json()
            .await
            .map_err(StorageError::transport)?;
        Ok(description.status)
    }

    async fn get_job_output(
        &self,
        vault: &str,
        job_id: &JobId,
    ) -> Result<BoxStream<'static, Result<Bytes, StorageError>>, StorageError> {
        let request = self.client.get(format!(
            "{}/vaults/{}/jobs/{}/output",
            self.endpoint, vault, job_id
        ));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let response = Self::check(response).await?;
        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| StorageError::transport(anyhow!("error reading job output: {:?}", e)))
        });
        Ok(Box::pin(stream))
    }

    async fn delete_archive(
        &self,
        vault: &str,
        archive_id: &ArchiveId,
    ) -> Result<DeletionStatus, StorageError> {
        let request = self.client.delete(format!(
            "{}/vaults/{}/archives/{}",
            self.endpoint, vault, archive_id
        ));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(StorageError::transport)?;
        let payload: DeleteResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(StorageError::transport)?;
        Ok(payload.status)
    }
}
