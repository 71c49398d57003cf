use std::pin::Pin;

use futures_core::Stream;

use crate::ai_sdk_types::{ChatGenerationChunk, ChatMessage, ChatResult};
use crate::core::SdkError;

/// Ordered stream of normalized chat chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatGenerationChunk, SdkError>> + Send>>;

/// Chat model interface.
///
/// `CallOptions` carries per-call overrides (parameters, tools, cancellation)
/// layered over the instance defaults.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    type CallOptions: Default + Send + Sync;

    /// Provider name for logging/telemetry.
    fn provider_name(&self) -> &'static str;
    /// Provider-specific model identifier.
    fn model_id(&self) -> &str;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &Self::CallOptions,
    ) -> Result<ChatResult, SdkError>;

    /// Start a streaming call. The request is sent before this returns; chunks
    /// are pulled lazily.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &Self::CallOptions,
    ) -> Result<ChatStream, SdkError>;
}
