use crate::{
    config::Automatic1111Config,
    error::GenerationError,
    generation::{error_from_response, traits::ImageGenerationClient, transport_error, REQUEST_TIMEOUT},
    models::{Automatic1111Request, Automatic1111Response, GenerationRequest, GenerationResult},
    retry::RetryPolicy,
};
use async_trait::async_trait;
use reqwest::Client;

/// Synchronous txt2img against a Stable Diffusion WebUI.
#[derive(Clone)]
pub struct Automatic1111Client {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl Automatic1111Client {
    pub fn new(config: &Automatic1111Config, retry: RetryPolicy) -> Self {
        Self::with_client(Client::new(), config, retry)
    }

    pub fn with_client(client: Client, config: &Automatic1111Config, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: format!("{}/sdapi/v1/txt2img", config.url.trim_end_matches('/')),
            retry,
        }
    }

    async fn txt2img(
        &self,
        payload: &Automatic1111Request,
    ) -> Result<Automatic1111Response, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ImageGenerationClient for Automatic1111Client {
    fn name(&self) -> &str {
        "automatic1111"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        request.validate()?;
        let payload = Automatic1111Request::from(request);

        log::info!("Generating image with AUTOMATIC1111 at {}", self.endpoint);
        log::debug!(
            "txt2img payload: {}",
            serde_json::to_string(&payload).unwrap_or_default()
        );

        let response = self
            .retry
            .run("AUTOMATIC1111 txt2img", GenerationError::is_retryable, |_| {
                self.txt2img(&payload)
            })
            .await?;

        let image = response
            .images
            .into_iter()
            .next()
            .or(response.image)
            .ok_or_else(|| GenerationError::MalformedResponse("No images were generated".into()))?;

        let result = GenerationResult::from_base64(&image, "image/png")?;
        log::info!("Received {} byte image from AUTOMATIC1111", result.len());
        Ok(result)
    }
}
