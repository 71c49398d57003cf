use serde_json::{json, Map, Value as JsonValue};

use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_types::{
    ChatMessage, ChatMessageChunk, MessageContent, Role, ToolCallChunk, UsageMetadata,
};
use crate::provider_watsonx::api_types::{ChatChoice, ChatResponseMessage, WireToolCall};
use crate::provider_watsonx::tools::convert::parse_tool_calls;
use crate::provider_watsonx::tools::tool_call_id::to_provider_tool_call_id;

fn wire_role(role: &Role) -> Result<&'static str, SdkError> {
    match role {
        Role::User => Ok("user"),
        Role::Assistant | Role::Function => Ok("assistant"),
        Role::System => Ok("system"),
        Role::Tool => Ok("tool"),
        Role::Custom(other) => Err(SdkError::invalid_argument(format!(
            "unknown message role: {other}"
        ))),
    }
}

fn text_content(content: &MessageContent) -> Result<String, SdkError> {
    match content {
        MessageContent::Text(s) => Ok(s.clone()),
        MessageContent::Parts(parts) => Err(SdkError::invalid_argument(format!(
            "watsonx chat does not support non text message content. Received: {}",
            JsonValue::Array(parts.clone())
        ))),
    }
}

/// Outgoing tool calls of an assistant message, `None` when it has none.
fn wire_tool_calls(message: &ChatMessage, remap_ids: bool) -> Option<Vec<JsonValue>> {
    let fix_id = |id: &str| {
        if remap_ids {
            to_provider_tool_call_id(id)
        } else {
            id.to_string()
        }
    };
    if matches!(message.role, Role::Assistant) && !message.tool_calls.is_empty() {
        return Some(
            message
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": fix_id(tc.id.as_deref().unwrap_or("")),
                        "type": "function",
                        "function": {"name": tc.name, "arguments": tc.args.to_string()},
                    })
                })
                .collect(),
        );
    }
    let raw = message.raw_tool_calls.as_ref().filter(|r| !r.is_empty())?;
    Some(
        raw.iter()
            .map(|tc| {
                let id = tc.get("id").and_then(|v| v.as_str()).map(fix_id);
                json!({
                    "id": id,
                    "type": "function",
                    "function": tc.get("function").cloned().unwrap_or(JsonValue::Null),
                })
            })
            .collect(),
    )
}

/// Canonical messages to `text/chat` messages.
///
/// Assistant messages carrying tool calls are sent with empty content. Tool
/// results keep `tool_call_id` and `name`. With `remap_ids`, every tool-call
/// id is rewritten to the 9-character alphanumeric form.
pub fn convert_to_watsonx_messages(
    messages: &[ChatMessage],
    remap_ids: bool,
) -> Result<Vec<JsonValue>, SdkError> {
    messages
        .iter()
        .map(|message| {
            let role = wire_role(&message.role)?;
            let tool_calls = wire_tool_calls(message, remap_ids);
            let content = match tool_calls {
                Some(_) => String::new(),
                None => text_content(&message.content)?,
            };
            let mut out = Map::new();
            out.insert("role".into(), json!(role));
            out.insert("content".into(), json!(content));
            if let Some(id) = &message.tool_call_id {
                let id = if remap_ids {
                    to_provider_tool_call_id(id)
                } else {
                    id.clone()
                };
                out.insert("tool_call_id".into(), json!(id));
                if let Some(name) = &message.name {
                    out.insert("name".into(), json!(name));
                }
            } else if let Some(calls) = tool_calls {
                out.insert("tool_calls".into(), JsonValue::Array(calls));
            }
            Ok(JsonValue::Object(out))
        })
        .collect()
}

fn raw_tool_calls(calls: &[WireToolCall]) -> Option<Vec<JsonValue>> {
    if calls.is_empty() {
        return None;
    }
    Some(
        calls
            .iter()
            .map(|tc| {
                let mut tc = tc.clone();
                tc.kind = Some("function".into());
                serde_json::to_value(tc).unwrap_or(JsonValue::Null)
            })
            .collect(),
    )
}

/// One response choice as a canonical message.
///
/// Assistant replies carry parsed tool calls (failures kept as invalid tool
/// calls), the raw calls, the response id and usage. Any other role is
/// returned as a user message with the content.
pub fn choice_to_message(
    choice: &ChatChoice,
    response_id: Option<&str>,
    usage: Option<UsageMetadata>,
) -> Result<ChatMessage, SdkError> {
    let message = choice.message.as_ref().ok_or_else(|| SdkError::Upstream {
        status: 200,
        message: "No message presented".into(),
        source: None,
    })?;
    let content = message.content.clone().unwrap_or_default();
    match message.role.as_deref() {
        Some("assistant") => {
            let parsed = parse_tool_calls(&message.tool_calls);
            let mut out = ChatMessage::assistant(content);
            out.tool_calls = parsed.valid;
            out.invalid_tool_calls = parsed.invalid;
            out.raw_tool_calls = raw_tool_calls(&message.tool_calls);
            out.id = response_id.map(str::to_string);
            out.usage_metadata = usage;
            Ok(out)
        }
        _ => Ok(ChatMessage::user(content)),
    }
}

/// One streamed delta as a canonical chunk.
///
/// The role falls back to `default_role`, then to assistant. Returns `None`
/// for deltas that carry nothing for their role: tool deltas without tool
/// calls and custom-role deltas that are empty.
pub fn delta_to_chunk(
    delta: &ChatResponseMessage,
    response_id: Option<&str>,
    usage: Option<UsageMetadata>,
    default_role: Option<&Role>,
) -> Result<Option<ChatMessageChunk>, SdkError> {
    if let Some(refusal) = delta.refusal.as_ref().filter(|r| !r.is_empty()) {
        return Err(SdkError::Refusal {
            message: refusal.clone(),
        });
    }
    let role = match (&delta.role, default_role) {
        (Some(r), _) => Role::from(r.as_str()),
        (None, Some(r)) => r.clone(),
        (None, None) => Role::Assistant,
    };
    let content = delta.content.clone().unwrap_or_default();
    let raw = raw_tool_calls(&delta.tool_calls);

    let chunk = match role {
        Role::User => Some(ChatMessageChunk::new(Role::User, content)),
        Role::Assistant => {
            let mut chunk = ChatMessageChunk::new(Role::Assistant, content);
            chunk.tool_call_chunks = delta
                .tool_calls
                .iter()
                .enumerate()
                .map(|(pos, tc)| ToolCallChunk {
                    id: tc.id.clone(),
                    name: tc.name().map(str::to_string),
                    args: tc
                        .function
                        .as_ref()
                        .and_then(|f| f.arguments.as_ref())
                        .map(|_| tc.arguments_text()),
                    index: Some(tc.index.unwrap_or(pos)),
                })
                .collect();
            chunk.usage_metadata = Some(usage.unwrap_or_default());
            chunk.id = response_id.map(str::to_string);
            chunk.raw_tool_calls = raw;
            Some(chunk)
        }
        Role::Tool => raw.map(|raw| {
            let mut chunk = ChatMessageChunk::new(Role::Tool, content);
            chunk.tool_call_id = delta.tool_calls.first().and_then(|tc| tc.id.clone());
            chunk.raw_tool_calls = Some(raw);
            chunk
        }),
        Role::Function => {
            let mut chunk = ChatMessageChunk::new(Role::Function, content);
            chunk.raw_tool_calls = raw;
            Some(chunk)
        }
        Role::System => Some(ChatMessageChunk::new(Role::System, content)),
        Role::Custom(name) => {
            if content.is_empty() && raw.is_none() {
                None
            } else {
                let mut chunk = ChatMessageChunk::new(Role::Custom(name), content);
                chunk.raw_tool_calls = raw;
                Some(chunk)
            }
        }
    };
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_sdk_types::ToolCall;

    #[test]
    fn system_role_deltas_pass_through() {
        let delta = ChatResponseMessage {
            role: Some("system".into()),
            content: Some("x".into()),
            ..Default::default()
        };
        let chunk = delta_to_chunk(&delta, None, None, None).unwrap().unwrap();
        assert_eq!(chunk.role, Role::System);
    }

    #[test]
    fn function_role_maps_to_assistant_on_the_wire() {
        let msgs = vec![ChatMessage::new(Role::Function, "result")];
        let out = convert_to_watsonx_messages(&msgs, false).unwrap();
        assert_eq!(out[0]["role"], "assistant");
        assert_eq!(out[0]["content"], "result");
    }

    #[test]
    fn assistant_tool_calls_keep_ids_without_remap() {
        let msgs = vec![ChatMessage::assistant_tool_calls(vec![ToolCall {
            id: Some("call_1".into()),
            name: "f".into(),
            args: json!({"a": 1}),
        }])];
        let out = convert_to_watsonx_messages(&msgs, false).unwrap();
        assert_eq!(out[0]["content"], "");
        assert_eq!(out[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(out[0]["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
    }
}
