use async_stream::try_stream;
use tokio_util::sync::CancellationToken;

use crate::ai_sdk_core::chat::ChatStream;
use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_streaming_sse::RecordStreamExt;
use crate::ai_sdk_types::usage::from_watsonx_chat;
use crate::ai_sdk_types::{ChatGenerationChunk, GenerationInfo, Role};
use crate::provider_watsonx::api_types::ChatStreamChunk;
use crate::provider_watsonx::chat::convert::delta_to_chunk;
use crate::provider_watsonx::service::ByteStream;
use crate::provider_watsonx::stream::{decode_record, next_record, RecordPayload};

/// Normalize a `text/chat_stream` body into chat chunks.
///
/// Records without a choice or delta are skipped. The role of the last delta
/// that named one is applied to later deltas that omit it. Cancellation is
/// checked before every pull from the transport.
pub fn build_chat_stream(bytes: ByteStream, signal: Option<CancellationToken>) -> ChatStream {
    Box::pin(try_stream! {
        let mut records = bytes.into_record_stream();
        let mut default_role: Option<Role> = None;
        while let Some(record) = next_record(&mut records, signal.as_ref()).await? {
            let value = match decode_record(&record)? {
                RecordPayload::Data(v) => v,
                RecordPayload::Skip => continue,
                RecordPayload::Close => break,
            };
            let data: ChatStreamChunk = serde_json::from_value(value).map_err(SdkError::from)?;
            let Some(choice) = data.choices.first() else { continue };
            let Some(delta) = choice.delta.as_ref() else { continue };

            let usage = data.usage.as_ref().and_then(from_watsonx_chat);
            let message = delta_to_chunk(delta, data.id.as_deref(), usage, default_role.as_ref())?;
            if let Some(role) = &delta.role {
                default_role = Some(Role::from(role.as_str()));
            }
            let Some(message) = message else { continue };

            yield ChatGenerationChunk {
                text: delta.content.clone().unwrap_or_default(),
                message,
                generation_info: GenerationInfo {
                    prompt: 0,
                    completion: choice.index,
                    finish_reason: choice.finish_reason.clone(),
                },
            };
        }
    })
}
