use crate::ai_sdk_types::embedding::Embedding;
use crate::core::SdkError;

/// Embedding model interface.
#[async_trait::async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Provider name for logging/telemetry.
    fn provider_name(&self) -> &'static str;
    /// Provider-specific model identifier.
    fn model_id(&self) -> &str;

    /// One vector per input text, preserving input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, SdkError>;

    /// Embed a single text through the batch path.
    async fn embed_query(&self, text: &str) -> Result<Embedding, SdkError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SdkError::Upstream {
                status: 200,
                message: "embedding response contained no vectors".into(),
                source: None,
            })
    }
}
