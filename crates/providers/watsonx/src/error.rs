use serde::{Deserialize, Serialize};

use crate::ai_sdk_core::error::{
    http_status_fallback_message, map_http_status_to_rate_limited_error,
    map_http_status_to_upstream_error, SdkError, TransportError,
};

/// One entry of a watsonx error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatsonxErrorItem {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub more_info: Option<String>,
}

/// `{"errors":[...],"trace":"...","status_code":400}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatsonxErrorData {
    pub errors: Vec<WatsonxErrorItem>,
    #[serde(default)]
    pub trace: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl WatsonxErrorData {
    /// First error rendered as `code: message`.
    pub fn summary(&self) -> Option<String> {
        self.errors.first().map(|e| match &e.code {
            Some(code) => format!("{code}: {}", e.message),
            None => e.message.clone(),
        })
    }
}

/// Extract a human-readable message from a watsonx error body.
///
/// IAM token errors use `errorMessage` instead of the `errors` array.
pub fn parse_error_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Ok(data) = serde_json::from_value::<WatsonxErrorData>(v.clone()) {
        return data.summary();
    }
    v.get("errorMessage")
        .or_else(|| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Map a transport failure to an SdkError, surfacing the provider's message.
pub fn map_transport_error_to_sdk_error(te: TransportError) -> SdkError {
    match te {
        TransportError::HttpStatus {
            status,
            body,
            retry_after_ms,
            headers,
            ..
        } => {
            if status == 429 {
                return map_http_status_to_rate_limited_error(status, body, retry_after_ms, headers);
            }
            let message = parse_error_message(&body);
            if status == 401 {
                tracing::debug!(
                    "[WATSONX]: unauthorized: {}",
                    message
                        .as_deref()
                        .unwrap_or(&http_status_fallback_message(status))
                );
                return SdkError::Unauthorized;
            }
            map_http_status_to_upstream_error(status, body, retry_after_ms, headers, message)
        }
        other => SdkError::Transport(other),
    }
}
