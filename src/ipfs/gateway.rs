use crate::{
    error::RortalError,
    models::{gateway_url_with, TokenContent, TokenMetadata, DEFAULT_GATEWAY_URL},
};
use reqwest::Client;
use std::time::Duration;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only access to pinned content through a public HTTP gateway.
#[derive(Clone)]
pub struct IpfsGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Default for IpfsGateway {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

impl IpfsGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HTTP URL for a token URI; non-IPFS URIs are returned unchanged.
    pub fn url_for(&self, uri: &str) -> String {
        gateway_url_with(&self.base_url, uri)
    }

    /// Fetches whatever a token URI points at. JSON bodies must be ERC-721
    /// metadata; `image/*` bodies are reported as media.
    pub async fn fetch(&self, uri: &str) -> Result<TokenContent, RortalError> {
        let url = self.url_for(uri);
        log::debug!("Fetching token content from {}", url);

        let fetch = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| RortalError::Metadata(format!("{}: {}", url, e)))?;
            let status = response.status();
            if !status.is_success() {
                return Err(RortalError::Metadata(format!("{} returned HTTP {}", url, status.as_u16())));
            }
            let mime_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = response
                .bytes()
                .await
                .map_err(|e| RortalError::Metadata(format!("{}: {}", url, e)))?;
            Ok((mime_type, body))
        };

        let (mime_type, body) = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| RortalError::Metadata(format!("{} timed out after {:?}", url, self.timeout)))??;

        if mime_type.starts_with("image/") {
            return Ok(TokenContent::Media {
                mime_type,
                size: body.len(),
            });
        }

        let metadata: TokenMetadata = serde_json::from_slice(&body)
            .map_err(|e| RortalError::Metadata(format!("{} is not ERC-721 metadata: {}", url, e)))?;
        Ok(TokenContent::Metadata(metadata))
    }
}
