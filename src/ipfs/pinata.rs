use crate::{
    config::PinataConfig,
    error::UploadError,
    ipfs::traits::PinningService,
    models::{PinResult, PinataJsonRequest, PinataMetadata, PinataPinResponse, TokenMetadata},
    retry::RetryPolicy,
};
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use std::time::Duration;

#[derive(Clone)]
enum PinataAuth {
    Jwt(String),
    Keys { api_key: String, secret: String },
}

/// Pinata pinning API. Each attempt runs under its own deadline; a retried
/// upload can leave an extra unused pin behind on the service.
#[derive(Clone)]
pub struct PinataClient {
    client: Client,
    base_url: String,
    auth: Option<PinataAuth>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl PinataClient {
    pub fn new(config: &PinataConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &PinataConfig) -> Self {
        let auth = match (&config.jwt, &config.api_key, &config.secret_api_key) {
            (Some(jwt), _, _) => Some(PinataAuth::Jwt(jwt.clone())),
            (None, Some(api_key), Some(secret)) => Some(PinataAuth::Keys {
                api_key: api_key.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        };

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth,
            timeout: config.timeout,
            retry: config.retry.clone(),
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, UploadError> {
        match &self.auth {
            Some(PinataAuth::Jwt(jwt)) => Ok(builder.bearer_auth(jwt)),
            Some(PinataAuth::Keys { api_key, secret }) => Ok(builder
                .header("pinata_api_key", api_key)
                .header("pinata_secret_api_key", secret)),
            None => Err(UploadError::MissingCredentials),
        }
    }

    /// Sends one request and reads the pin response, all under the deadline.
    /// Dropping the in-flight future on expiry aborts the request.
    async fn send_pin(&self, builder: RequestBuilder) -> Result<PinResult, UploadError> {
        let attempt = async {
            let response = builder.send().await.map_err(transport_error)?;
            let status = response.status();
            let body = response.bytes().await.map_err(transport_error)?;

            if !status.is_success() {
                return Err(UploadError::Http {
                    status: Some(status.as_u16()),
                    message: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            let parsed: PinataPinResponse = serde_json::from_slice(&body)
                .map_err(|e| UploadError::MalformedResponse(e.to_string()))?;
            match parsed.ipfs_hash {
                Some(cid) if !cid.trim().is_empty() => Ok(PinResult::new(cid)),
                _ => Err(UploadError::MalformedResponse(
                    "response is missing IpfsHash".to_string(),
                )),
            }
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Timeout(self.timeout)),
        }
    }

    async fn pin_file_once(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<PinResult, UploadError> {
        let part = match multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_type)
        {
            Ok(part) => part,
            Err(_) => {
                log::warn!("Unrecognised mime type '{}', sending without one", mime_type);
                multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string())
            }
        };
        let form = multipart::Form::new().part("file", part);

        let builder = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.base_url))
            .multipart(form);
        self.send_pin(self.authorize(builder)?).await
    }

    async fn pin_json_once(&self, request: &PinataJsonRequest<'_>) -> Result<PinResult, UploadError> {
        let builder = self
            .client
            .post(format!("{}/pinning/pinJSONToIPFS", self.base_url))
            .json(request);
        self.send_pin(self.authorize(builder)?).await
    }

    /// Verifies the configured credentials against Pinata.
    pub async fn health_check(&self) -> Result<bool, UploadError> {
        let builder = self
            .client
            .get(format!("{}/data/testAuthentication", self.base_url))
            .timeout(self.timeout);
        let response = self
            .authorize(builder)?
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl PinningService for PinataClient {
    fn name(&self) -> &str {
        "pinata"
    }

    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<PinResult, UploadError> {
        if self.auth.is_none() {
            return Err(UploadError::MissingCredentials);
        }
        if bytes.is_empty() {
            return Err(UploadError::EmptyPayload);
        }

        log::info!("Pinning {} ({} bytes) to IPFS via Pinata", filename, bytes.len());
        let pin = self
            .retry
            .run("Pinata upload", UploadError::is_retryable, |_| {
                self.pin_file_once(bytes, filename, mime_type)
            })
            .await?;
        log::info!("Pinned {} as {}", filename, pin.cid);
        Ok(pin)
    }

    async fn pin_json(&self, metadata: &TokenMetadata, name: &str) -> Result<PinResult, UploadError> {
        if self.auth.is_none() {
            return Err(UploadError::MissingCredentials);
        }

        let request = PinataJsonRequest {
            content: metadata,
            metadata: PinataMetadata {
                name: name.to_string(),
            },
        };
        let pin = self
            .retry
            .run("Pinata JSON pin", UploadError::is_retryable, |_| {
                self.pin_json_once(&request)
            })
            .await?;
        log::info!("Pinned metadata {} as {}", name, pin.cid);
        Ok(pin)
    }
}

fn transport_error(e: reqwest::Error) -> UploadError {
    UploadError::Http {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}
