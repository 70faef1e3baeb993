use crate::{
    config::HuggingFaceConfig,
    error::GenerationError,
    generation::{error_from_response, traits::ImageGenerationClient, transport_error, REQUEST_TIMEOUT},
    models::{GenerationRequest, GenerationResult, HuggingFaceRequest},
    retry::RetryPolicy,
};
use async_trait::async_trait;
use reqwest::{header, Client};

/// Hosted inference: one POST, raw image bytes back. A cold model answers 503
/// while loading, which the retry policy treats as transient.
#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HuggingFaceClient {
    pub fn new(config: &HuggingFaceConfig, retry: RetryPolicy) -> Self {
        Self::with_client(Client::new(), config, retry)
    }

    pub fn with_client(client: Client, config: &HuggingFaceConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/models/{}",
                config.url.trim_end_matches('/'),
                config.model
            ),
            token: config.token.clone(),
            retry,
        }
    }

    async fn infer(&self, payload: &HuggingFaceRequest) -> Result<GenerationResult, GenerationError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "image/png")
            .header("x-wait-for-model", "true")
            .timeout(REQUEST_TIMEOUT)
            .json(payload);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let body = response.bytes().await.map_err(transport_error)?;

        if !content_type.starts_with("image/") {
            return Err(GenerationError::MalformedResponse(format!(
                "expected image bytes, got {}: {}",
                content_type,
                String::from_utf8_lossy(&body)
            )));
        }

        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("image/png")
            .trim()
            .to_string();
        GenerationResult::new(body.to_vec(), mime)
    }
}

#[async_trait]
impl ImageGenerationClient for HuggingFaceClient {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        request.validate()?;
        let payload = HuggingFaceRequest::from(request);

        log::info!("Generating image with Hugging Face model at {}", self.endpoint);
        let result = self
            .retry
            .run("Hugging Face inference", GenerationError::is_retryable, |_| {
                self.infer(&payload)
            })
            .await?;

        log::info!(
            "Received {} byte {} image from Hugging Face",
            result.len(),
            result.mime_type()
        );
        Ok(result)
    }
}
