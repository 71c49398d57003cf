use std::pin::Pin;

use futures_core::Stream;

use crate::ai_sdk_types::{GenerationChunk, LlmResult};
use crate::core::SdkError;

pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk, SdkError>> + Send>>;

/// Plain text-completion model interface.
#[async_trait::async_trait]
pub trait CompletionModel: Send + Sync {
    type CallOptions: Default + Send + Sync;

    fn provider_name(&self) -> &'static str;
    fn model_id(&self) -> &str;

    /// One generation list per prompt, in prompt order, with summed usage.
    async fn generate(
        &self,
        prompts: &[String],
        options: &Self::CallOptions,
    ) -> Result<LlmResult, SdkError>;

    async fn stream(
        &self,
        prompt: &str,
        options: &Self::CallOptions,
    ) -> Result<GenerationStream, SdkError>;
}
