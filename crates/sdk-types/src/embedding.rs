use serde::{Deserialize, Serialize};

/// Single embedding vector.
pub type Embedding = Vec<f32>;

/// Token usage reported by an embedding call.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EmbedUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_count: Option<u64>,
}

/// Vectors for a batch of documents, in input order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EmbedResponse {
    pub embeddings: Vec<Embedding>,
    #[serde(default)]
    pub usage: EmbedUsage,
}
