use std::collections::BTreeMap;

use futures_util::StreamExt;

use crate::ai_sdk_types::{
    ChatGeneration, ChatGenerationChunk, ChatMessage, MessageContent, ToolCallChunk,
    UsageMetadata,
};
use crate::core::chat::ChatStream;
use crate::core::tool_calls::parse_tool_call;
use crate::core::SdkError;

#[derive(Default)]
struct MergedToolCall {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

/// Fold streamed chat chunks into a single generation.
///
/// Content is concatenated in order. Tool-call fragments sharing an index are
/// merged (first non-empty id/name wins, argument text is appended) and then
/// parsed strictly; fragments that never form a valid object end up in
/// `invalid_tool_calls`. Usage is summed; the last finish reason is kept.
/// Returns `None` for an empty input.
pub fn concat_chat_chunks(chunks: &[ChatGenerationChunk]) -> Option<ChatGeneration> {
    let first = chunks.first()?;
    let mut text = String::new();
    let mut calls: BTreeMap<usize, MergedToolCall> = BTreeMap::new();
    let mut usage: Option<UsageMetadata> = None;
    let mut finish_reason: Option<String> = None;
    let mut id: Option<String> = None;
    let mut tool_call_id: Option<String> = None;

    for chunk in chunks {
        text.push_str(&chunk.message.content);
        for (pos, tc) in chunk.message.tool_call_chunks.iter().enumerate() {
            merge_fragment(calls.entry(tc.index.unwrap_or(pos)).or_default(), tc);
        }
        if let Some(u) = chunk.message.usage_metadata {
            *usage.get_or_insert_with(UsageMetadata::default) += u;
        }
        if chunk.generation_info.finish_reason.is_some() {
            finish_reason = chunk.generation_info.finish_reason.clone();
        }
        if id.is_none() {
            id = chunk.message.id.clone();
        }
        if tool_call_id.is_none() {
            tool_call_id = chunk.message.tool_call_id.clone();
        }
    }

    let mut message = ChatMessage::new(first.message.role.clone(), MessageContent::Text(text.clone()));
    for merged in calls.into_values() {
        match parse_tool_call(merged.id, merged.name, &merged.args) {
            Ok(tc) => message.tool_calls.push(tc),
            Err(invalid) => message.invalid_tool_calls.push(invalid),
        }
    }
    message.id = id;
    message.tool_call_id = tool_call_id;
    message.usage_metadata = usage;

    Some(ChatGeneration {
        text,
        message,
        finish_reason,
    })
}

fn merge_fragment(acc: &mut MergedToolCall, tc: &ToolCallChunk) {
    if acc.id.is_none() {
        acc.id = tc.id.clone().filter(|s| !s.is_empty());
    }
    if acc.name.is_none() {
        acc.name = tc.name.clone().filter(|s| !s.is_empty());
    }
    if let Some(args) = &tc.args {
        acc.args.push_str(args);
    }
}

/// Fold chunks of a multi-candidate stream (`n > 1`) into one generation per
/// candidate, ordered by `generation_info.completion`.
///
/// Chunks of different candidates may interleave; each group is folded on
/// its own with [`concat_chat_chunks`], so tool-call fragments only merge
/// within their candidate.
pub fn concat_chat_candidates(chunks: &[ChatGenerationChunk]) -> Vec<ChatGeneration> {
    let mut groups: BTreeMap<usize, Vec<ChatGenerationChunk>> = BTreeMap::new();
    for chunk in chunks {
        groups
            .entry(chunk.generation_info.completion)
            .or_default()
            .push(chunk.clone());
    }
    groups
        .into_values()
        .filter_map(|group| concat_chat_chunks(&group))
        .collect()
}

/// Drive a chat stream to completion and fold it per candidate with
/// [`concat_chat_candidates`].
pub async fn collect_chat_candidates(mut stream: ChatStream) -> Result<Vec<ChatGeneration>, SdkError> {
    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item?);
    }
    Ok(concat_chat_candidates(&chunks))
}

/// Drive a chat stream to completion and fold it with [`concat_chat_chunks`].
///
/// The first error (including cancellation) is returned as-is.
pub async fn collect_chat_stream(mut stream: ChatStream) -> Result<Option<ChatGeneration>, SdkError> {
    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item?);
    }
    Ok(concat_chat_chunks(&chunks))
}
