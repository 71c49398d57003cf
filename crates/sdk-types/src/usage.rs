use crate::types::{TokenUsage, UsageMetadata};
use serde_json::Value;

fn count(obj: &serde_json::Map<String, Value>, key: &str) -> u64 {
    obj.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Parse a watsonx chat `usage` object into [`UsageMetadata`].
///
/// Missing counters default to 0; `total_tokens` falls back to the sum of
/// prompt and completion tokens only when absent.
pub fn from_watsonx_chat(u: &Value) -> Option<UsageMetadata> {
    let obj = u.as_object()?;
    let input = count(obj, "prompt_tokens");
    let output = count(obj, "completion_tokens");
    let total = obj
        .get("total_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(input + output);
    Some(UsageMetadata {
        input_tokens: input,
        output_tokens: output,
        total_tokens: total,
    })
}

/// Read the token counters of one text-generation `results[]` entry.
pub fn from_watsonx_generation(result: &Value) -> TokenUsage {
    match result.as_object() {
        Some(obj) => TokenUsage {
            generated_token_count: count(obj, "generated_token_count"),
            input_token_count: count(obj, "input_token_count"),
        },
        None => TokenUsage::default(),
    }
}
