use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_streaming_sse::StreamRecord;
use crate::provider_watsonx::error::WatsonxErrorData;

/// Pull the next record, racing the cancellation token.
///
/// A token that fired before the pull wins even when a record is ready.
pub(crate) async fn next_record<S>(
    records: &mut S,
    signal: Option<&CancellationToken>,
) -> Result<Option<StreamRecord>, SdkError>
where
    S: Stream<Item = Result<StreamRecord, SdkError>> + Unpin,
{
    match signal {
        Some(token) => {
            if token.is_cancelled() {
                return Err(SdkError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(SdkError::Cancelled),
                next = records.next() => next.transpose(),
            }
        }
        None => records.next().await.transpose(),
    }
}

/// What a record means to the normalizers.
pub(crate) enum RecordPayload {
    Data(JsonValue),
    Skip,
    Close,
}

/// Interpret one record: `error` events fail the stream, `close` ends it and
/// records without parseable data are skipped.
pub(crate) fn decode_record(record: &StreamRecord) -> Result<RecordPayload, SdkError> {
    match record.event.as_deref() {
        Some("close") => return Ok(RecordPayload::Close),
        Some("error") => return Err(stream_error(record.data.as_deref().unwrap_or(""))),
        _ => {}
    }
    let Some(data) = record.data.as_deref().map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(RecordPayload::Skip);
    };
    match serde_json::from_str::<JsonValue>(data) {
        Ok(v) if v.get("errors").is_some() => Err(stream_error(data)),
        Ok(v) => Ok(RecordPayload::Data(v)),
        Err(e) => {
            warn!("[WATSONX]: skipping undecodable stream record: {}", e);
            Ok(RecordPayload::Skip)
        }
    }
}

fn stream_error(data: &str) -> SdkError {
    debug!("[WATSONX]: error event in stream: {}", data);
    match serde_json::from_str::<WatsonxErrorData>(data) {
        Ok(err) => SdkError::Upstream {
            status: err.status_code.unwrap_or(500),
            message: err.summary().unwrap_or_else(|| "stream error".into()),
            source: None,
        },
        Err(_) => SdkError::Upstream {
            status: 500,
            message: if data.is_empty() { "stream error".into() } else { data.to_string() },
            source: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_events_become_upstream_errors() {
        let record = StreamRecord::data(
            r#"{"errors":[{"code":"model_not_supported","message":"nope"}],"status_code":404}"#,
        )
        .with_event("error");
        match decode_record(&record) {
            Err(SdkError::Upstream { status, message, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "model_not_supported: nope");
            }
            _ => panic!("expected upstream error"),
        }
    }

    #[test]
    fn empty_and_garbage_records_are_skipped() {
        assert!(matches!(
            decode_record(&StreamRecord::default().with_id(3)),
            Ok(RecordPayload::Skip)
        ));
        assert!(matches!(
            decode_record(&StreamRecord::data("{not json")),
            Ok(RecordPayload::Skip)
        ));
        assert!(matches!(
            decode_record(&StreamRecord::data("").with_event("close")),
            Ok(RecordPayload::Close)
        ));
    }
}
