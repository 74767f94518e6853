use batch_core::{BatchId, KeyPolicy, PollSnapshot};
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::wire::{ErrorBody, StatusResponse, SubmitResponse};
use crate::{Artifact, ClientError, ClientSettings, PollError, SubmissionError};

/// The remote extraction service.
#[async_trait::async_trait]
pub trait BatchClient: Send + Sync {
    /// Upload an artifact and return the id of the accepted batch.
    async fn submit_batch(&self, artifact: &Artifact) -> Result<BatchId, SubmissionError>;

    /// Fetch the full accumulated status of a batch.
    async fn get_batch_status(&self, batch_id: &BatchId) -> Result<PollSnapshot, PollError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBatchClient {
    base: Url,
    key_policy: KeyPolicy,
    client: reqwest::Client,
}

impl ReqwestBatchClient {
    pub fn new(settings: &ClientSettings, key_policy: KeyPolicy) -> Result<Self, ClientError> {
        let base = parse_base_url(&settings.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self {
            base,
            key_policy,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // The base was checked to be hierarchical in `parse_base_url`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|err| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "expected an http or https url".to_string(),
        });
    }
    Ok(url)
}

#[async_trait::async_trait]
impl BatchClient for ReqwestBatchClient {
    async fn submit_batch(&self, artifact: &Artifact) -> Result<BatchId, SubmissionError> {
        let part = Part::bytes(artifact.bytes.to_vec())
            .file_name(artifact.source.file_name.clone())
            .mime_str(artifact.source.media_kind.mime_type())
            .map_err(|err| SubmissionError::Network(err.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint(&["api", "batch", "upload"]))
            .multipart(form)
            .send()
            .await
            .map_err(|err| SubmissionError::Network(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| SubmissionError::Network(err.to_string()))?;
        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message: ErrorBody::parse(&body),
            });
        }

        let accepted: SubmitResponse = serde_json::from_slice(&body)
            .map_err(|err| SubmissionError::InvalidResponse(err.to_string()))?;
        let job_id = accepted.job_id.trim();
        if job_id.is_empty() {
            return Err(SubmissionError::InvalidResponse("empty job id".to_string()));
        }
        Ok(BatchId::from(job_id))
    }

    async fn get_batch_status(&self, batch_id: &BatchId) -> Result<PollSnapshot, PollError> {
        let response = self
            .client
            .get(self.endpoint(&["api", "batch", "status", batch_id.as_str()]))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed: StatusResponse =
            serde_json::from_slice(&body).map_err(|err| PollError::Decode(err.to_string()))?;
        Ok(parsed.into_snapshot(&self.key_policy))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> PollError {
    if err.is_timeout() {
        return PollError::Timeout;
    }
    PollError::Network(err.to_string())
}
