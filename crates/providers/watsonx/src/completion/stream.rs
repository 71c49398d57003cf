use async_stream::try_stream;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::ai_sdk_core::completion::GenerationStream;
use crate::ai_sdk_streaming_sse::RecordStreamExt;
use crate::ai_sdk_types::usage::from_watsonx_generation;
use crate::ai_sdk_types::{Generation, GenerationChunk, TokenUsage};
use crate::provider_watsonx::service::ByteStream;
use crate::provider_watsonx::stream::{decode_record, next_record, RecordPayload};

fn results(body: &JsonValue) -> &[JsonValue] {
    body.get("results")
        .and_then(|r| r.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text_of(result: &JsonValue) -> String {
    result
        .get("generated_text")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string()
}

fn stop_reason_of(result: &JsonValue) -> Option<String> {
    result
        .get("stop_reason")
        .and_then(|s| s.as_str())
        .map(str::to_string)
}

/// Generations and summed token counts of a `text/generation` response.
pub fn parse_generation_response(body: &JsonValue) -> (Vec<Generation>, TokenUsage) {
    let mut usage = TokenUsage::default();
    let generations = results(body)
        .iter()
        .map(|result| {
            usage += from_watsonx_generation(result);
            Generation {
                text: text_of(result),
                stop_reason: stop_reason_of(result),
            }
        })
        .collect();
    (generations, usage)
}

/// Normalize a `text/generation_stream` body: each `results[i]` of every
/// record becomes one chunk with index `i`.
pub fn build_generation_stream(
    bytes: ByteStream,
    signal: Option<CancellationToken>,
) -> GenerationStream {
    Box::pin(try_stream! {
        let mut records = bytes.into_record_stream();
        while let Some(record) = next_record(&mut records, signal.as_ref()).await? {
            let value = match decode_record(&record)? {
                RecordPayload::Data(v) => v,
                RecordPayload::Skip => continue,
                RecordPayload::Close => break,
            };
            for (index, result) in results(&value).iter().enumerate() {
                yield GenerationChunk {
                    text: text_of(result),
                    index,
                    stop_reason: stop_reason_of(result),
                    usage: from_watsonx_generation(result),
                };
            }
        }
    })
}
