//! Serde shapes of watsonx.ai request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// `{"type":"function","function":{...}}` as sent in `tools` and returned in
/// `tool_calls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<WireFunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Usually a JSON-encoded string; some models return an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<JsonValue>,
}

impl WireToolCall {
    pub fn name(&self) -> Option<&str> {
        self.function.as_ref()?.name.as_deref()
    }

    /// Argument text as received; objects are re-encoded.
    pub fn arguments_text(&self) -> String {
        match self.function.as_ref().and_then(|f| f.arguments.as_ref()) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Both a full response message and a streamed delta.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatStreamChoice>,
    #[serde(default)]
    pub usage: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatStreamChoice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub delta: Option<ChatResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingResult {
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingsResponse {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub results: Vec<EmbeddingResult>,
    #[serde(default)]
    pub input_token_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenizationResult {
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenizationResponse {
    #[serde(default)]
    pub model_id: Option<String>,
    pub result: TokenizationResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFunction {
    pub id: String,
}

/// Entry of `foundation_model_specs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationModelSpec {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default)]
    pub functions: Vec<ModelFunction>,
}

impl FoundationModelSpec {
    pub fn supports(&self, function: &str) -> bool {
        self.functions.iter().any(|f| f.id == function)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoundationModelSpecs {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub resources: Vec<FoundationModelSpec>,
}

/// Server-side tool advertised under `utility_agent_tools`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityAgentTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UtilityAgentTools {
    #[serde(default)]
    pub resources: Vec<UtilityAgentTool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_arguments_accept_string_or_object() {
        let s: WireToolCall = serde_json::from_value(json!({
            "id": "abc", "type": "function",
            "function": {"name": "f", "arguments": "{\"a\":1}"}
        }))
        .unwrap();
        assert_eq!(s.arguments_text(), r#"{"a":1}"#);
        let o: WireToolCall = serde_json::from_value(json!({
            "function": {"name": "f", "arguments": {"a": 1}}
        }))
        .unwrap();
        assert_eq!(o.arguments_text(), r#"{"a":1}"#);
        let empty: WireToolCall = serde_json::from_value(json!({"index": 0})).unwrap();
        assert_eq!(empty.arguments_text(), "");
        assert_eq!(empty.name(), None);
    }

    #[test]
    fn chat_response_tolerates_missing_fields() {
        let r: ChatResponse = serde_json::from_value(json!({
            "id": "chat-1",
            "choices": [{"message": {"role": "assistant", "content": "hi"}}]
        }))
        .unwrap();
        assert_eq!(r.choices.len(), 1);
        assert_eq!(r.choices[0].index, 0);
        assert!(r.choices[0].message.as_ref().unwrap().tool_calls.is_empty());
        assert!(r.usage.is_none());
    }

    #[test]
    fn model_spec_function_lookup() {
        let spec: FoundationModelSpec = serde_json::from_value(json!({
            "model_id": "ibm/slate-125m-english-rtrvr",
            "functions": [{"id": "embedding"}]
        }))
        .unwrap();
        assert!(spec.supports("embedding"));
        assert!(!spec.supports("text_generation"));
    }
}
