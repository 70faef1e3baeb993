use crate::{
    config::HordeConfig,
    error::GenerationError,
    generation::{error_from_response, traits::ImageGenerationClient, transport_error, REQUEST_TIMEOUT},
    models::{
        GenerationRequest, GenerationResult, HordeAsyncRequest, HordeAsyncResponse,
        HordeCheckResponse, HordeStatusResponse,
    },
    retry::RetryPolicy,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

const CLIENT_AGENT: &str = concat!("rortal:", env!("CARGO_PKG_VERSION"), ":unknown");
/// Horde images are WebP unless the worker says otherwise.
const DEFAULT_MIME: &str = "image/webp";

/// Asynchronous generation on Stable Horde: submit a job, poll `check`, fetch `status`.
#[derive(Clone)]
pub struct StableHordeClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_retry: RetryPolicy,
    poll_retry: RetryPolicy,
}

impl StableHordeClient {
    pub fn new(config: &HordeConfig, request_retry: RetryPolicy, poll_retry: RetryPolicy) -> Self {
        Self::with_client(Client::new(), config, request_retry, poll_retry)
    }

    pub fn with_client(
        client: Client,
        config: &HordeConfig,
        request_retry: RetryPolicy,
        poll_retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_retry,
            poll_retry,
        }
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenerationError> {
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }

    async fn submit(&self, payload: &HordeAsyncRequest) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/generate/async", self.base_url))
            .header("apikey", &self.api_key)
            .header("Client-Agent", CLIENT_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let accepted: HordeAsyncResponse = Self::read_json(response).await?;
        accepted.id.ok_or_else(|| {
            GenerationError::MalformedResponse(
                accepted
                    .message
                    .unwrap_or_else(|| "job submission returned no id".to_string()),
            )
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: String) -> Result<T, GenerationError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Client-Agent", CLIENT_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(response).await
    }

    async fn check(&self, id: &str) -> Result<HordeCheckResponse, GenerationError> {
        self.request_retry
            .run("Horde check", GenerationError::is_retryable, |_| {
                self.get_json(format!("/generate/check/{}", id))
            })
            .await
    }

    async fn status(&self, id: &str) -> Result<HordeStatusResponse, GenerationError> {
        self.request_retry
            .run("Horde status", GenerationError::is_retryable, |_| {
                self.get_json(format!("/generate/status/{}", id))
            })
            .await
    }

    async fn download(&self, url: &str) -> Result<GenerationResult, GenerationError> {
        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        let bytes = response.bytes().await.map_err(transport_error)?;
        GenerationResult::new(bytes.to_vec(), mime)
    }

    /// Polls until the job is done; faulted or impossible jobs end the wait early.
    async fn wait_for_job(&self, id: &str) -> Result<(), GenerationError> {
        let finished = self
            .poll_retry
            .poll("Horde job", |_| async move {
                let check = self.check(id).await?;
                if check.faulted || check.is_possible == Some(false) {
                    return Err(GenerationError::Faulted(id.to_string()));
                }
                if check.done {
                    return Ok(Some(()));
                }
                log::debug!(
                    "Horde job {} queued at position {:?}, ~{:?}s remaining",
                    id,
                    check.queue_position,
                    check.wait_time
                );
                Ok(None)
            })
            .await?;

        finished.ok_or(GenerationError::Timeout {
            attempts: self.poll_retry.max_attempts,
        })
    }
}

#[async_trait]
impl ImageGenerationClient for StableHordeClient {
    fn name(&self) -> &str {
        "horde"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        request.validate()?;
        let payload = HordeAsyncRequest::from(request);

        let id = self
            .request_retry
            .run("Horde submit", GenerationError::is_retryable, |_| {
                self.submit(&payload)
            })
            .await?;
        log::info!("Submitted Stable Horde job {}", id);

        self.wait_for_job(&id).await?;

        let status = self.status(&id).await?;
        if status.faulted {
            return Err(GenerationError::Faulted(id));
        }
        let generation = status.generations.into_iter().next().ok_or_else(|| {
            GenerationError::MalformedResponse(format!("job {} finished without generations", id))
        })?;

        let result = if generation.img.starts_with("http://") || generation.img.starts_with("https://")
        {
            log::debug!("Downloading Horde image from {}", generation.img);
            self.request_retry
                .run("Horde image download", GenerationError::is_retryable, |_| {
                    self.download(&generation.img)
                })
                .await?
        } else {
            GenerationResult::from_base64(&generation.img, DEFAULT_MIME)?
        };

        log::info!("Stable Horde job {} produced {} bytes", id, result.len());
        Ok(result)
    }
}
