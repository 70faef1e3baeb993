use crate::{
    error::GenerationError,
    models::{GenerationRequest, GenerationResult},
};
use async_trait::async_trait;

#[async_trait]
pub trait ImageGenerationClient: Send + Sync {
    fn name(&self) -> &str;

    /// Renders one image. Each backend exhausts its own retry and polling
    /// budget before returning an error.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError>;
}
