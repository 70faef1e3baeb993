pub mod automatic1111;
pub mod horde;
pub mod huggingface;
pub mod traits;

use crate::{
    config::{GenerationBackend, GenerationConfig},
    error::GenerationError,
    models::{BackendInfo, BackendMode, GenerationRequest, GenerationResult},
};
use std::sync::Arc;
use std::time::Duration;

pub use automatic1111::Automatic1111Client;
pub use horde::StableHordeClient;
pub use huggingface::HuggingFaceClient;
pub use traits::ImageGenerationClient;

/// Upper bound for a single generation HTTP call; local WebUI renders can be slow.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Picks the configured backend and hands it out behind the capability trait.
#[derive(Clone)]
pub struct GenerationManager {
    backend: Arc<dyn ImageGenerationClient>,
}

impl GenerationManager {
    pub fn new(config: &GenerationConfig) -> Self {
        let backend: Arc<dyn ImageGenerationClient> = match config.backend {
            GenerationBackend::Automatic1111 => Arc::new(Automatic1111Client::new(
                &config.automatic1111,
                config.request_retry.clone(),
            )),
            GenerationBackend::StableHorde => Arc::new(StableHordeClient::new(
                &config.horde,
                config.request_retry.clone(),
                config.poll_retry.clone(),
            )),
            GenerationBackend::HuggingFace => Arc::new(HuggingFaceClient::new(
                &config.huggingface,
                config.request_retry.clone(),
            )),
        };

        log::info!("Image generation backend: {}", backend.name());
        Self { backend }
    }

    pub fn from_backend(backend: Arc<dyn ImageGenerationClient>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn ImageGenerationClient> {
        Arc::clone(&self.backend)
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.backend.generate(request).await
    }

    pub fn supported_backends() -> Vec<BackendInfo> {
        vec![
            BackendInfo {
                id: GenerationBackend::Automatic1111.as_str().to_string(),
                name: "Stable Diffusion WebUI".to_string(),
                provider: "AUTOMATIC1111".to_string(),
                mode: BackendMode::Synchronous,
                description: "Local txt2img endpoint returning base64 PNGs".to_string(),
            },
            BackendInfo {
                id: GenerationBackend::StableHorde.as_str().to_string(),
                name: "Stable Horde".to_string(),
                provider: "AI Horde".to_string(),
                mode: BackendMode::Polling,
                description: "Crowdsourced async queue; submit, poll, then fetch".to_string(),
            },
            BackendInfo {
                id: GenerationBackend::HuggingFace.as_str().to_string(),
                name: "Hugging Face Inference".to_string(),
                provider: "Hugging Face".to_string(),
                mode: BackendMode::Synchronous,
                description: "Hosted diffusion models returning raw image bytes".to_string(),
            },
        ]
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> GenerationError {
    GenerationError::Http {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// Turns a non-2xx response into an error, preferring the backend's own
/// `detail`/`error`/`message` field over the raw body.
pub(crate) async fn error_from_response(response: reqwest::Response) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    GenerationError::Http {
        status: Some(status.as_u16()),
        message: extract_error_message(&body).unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        }),
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| json.get(*key))
        .map(|value| match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"detail": "Not Found"}"#).as_deref(),
            Some("Not Found")
        );
        assert_eq!(
            extract_error_message(r#"{"error": "Model is currently loading", "estimated_time": 20}"#)
                .as_deref(),
            Some("Model is currently loading")
        );
        assert_eq!(extract_error_message("<html>502</html>"), None);
    }

    #[test]
    fn test_supported_backends() {
        let backends = GenerationManager::supported_backends();
        assert_eq!(backends.len(), 3);
        assert!(backends
            .iter()
            .any(|b| b.id == "horde" && b.mode == BackendMode::Polling));
    }

    #[test]
    fn test_manager_selects_configured_backend() {
        let config = GenerationConfig::new().with_backend(GenerationBackend::HuggingFace);
        assert_eq!(GenerationManager::new(&config).backend().name(), "huggingface");
    }
}
