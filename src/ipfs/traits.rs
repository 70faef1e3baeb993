use crate::{
    error::UploadError,
    models::{PinResult, TokenMetadata},
};
use async_trait::async_trait;

#[async_trait]
pub trait PinningService: Send + Sync {
    fn name(&self) -> &str;

    /// Pins a file. Only a 2xx response carrying a content identifier yields a `PinResult`.
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<PinResult, UploadError>;

    /// Pins an ERC-721 metadata document as JSON.
    async fn pin_json(&self, metadata: &TokenMetadata, name: &str) -> Result<PinResult, UploadError>;
}
