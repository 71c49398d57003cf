use crate::core::retry::Retryable;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited {
        /// Milliseconds suggested by Retry-After if present
        retry_after_ms: Option<u64>,
        #[source]
        source: Option<Box<TransportError>>,
    },
    #[error("timeout")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("upstream error (status {status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        #[source]
        source: Option<Box<TransportError>>,
    },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    /// The model declined to answer; raised instead of yielding content.
    #[error("refusal: {message}")]
    Refusal { message: String },
    /// Model output could not be parsed into the requested shape.
    #[error("output parse error: {message}")]
    OutputParse { text: String, message: String },
}

impl SdkError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SdkError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SdkError::Cancelled)
    }
}

impl Retryable for SdkError {
    fn is_retryable(&self) -> bool {
        match self {
            SdkError::RateLimited { .. } | SdkError::Timeout => true,
            SdkError::Upstream { status, .. } => *status >= 500,
            SdkError::Transport(te) => match te {
                TransportError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
                TransportError::Other(_) => false,
                _ => true,
            },
            SdkError::Unauthorized
            | SdkError::Cancelled
            | SdkError::Serde(_)
            | SdkError::InvalidArgument { .. }
            | SdkError::Refusal { .. }
            | SdkError::OutputParse { .. } => false,
        }
    }

    fn retry_after_ms(&self) -> Option<u64> {
        match self {
            SdkError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            SdkError::Transport(te) => te.retry_after_ms(),
            _ => None,
        }
    }
}

impl SdkError {
    /// Format error details for better debugging visibility
    pub fn format_details(&self) -> String {
        match self {
            SdkError::RateLimited {
                retry_after_ms,
                source,
                ..
            } => {
                let mut msg = String::from("rate limited");

                // Add retry-after if present
                if let Some(ms) = retry_after_ms {
                    msg.push_str(&format!(" (retry after {}ms)", ms));
                }

                // Add source error details if available
                if let Some(src) = source {
                    // Extract the body from HttpStatus error if available
                    if let TransportError::HttpStatus { body, status, .. } = src.as_ref() {
                        msg = format!("http status {}: {}", status, body);
                    }
                }

                msg
            }
            SdkError::Upstream {
                status,
                message,
                source,
            } => {
                let mut msg = format!("http status {}: {}", status, message);

                // Add source body if different from message
                if let Some(src) = source {
                    if let TransportError::HttpStatus { body, .. } = src.as_ref() {
                        // Only add body if it's not already in the message
                        if !message.contains(body) && !body.is_empty() {
                            msg.push_str(&format!(" [body: {}]", body));
                        }
                    }
                }

                msg
            }
            SdkError::Timeout => "timeout".to_string(),
            SdkError::Unauthorized => "unauthorized".to_string(),
            SdkError::Cancelled => "cancelled".to_string(),
            SdkError::Transport(te) => format!("transport error: {}", te),
            SdkError::Serde(se) => format!("serde error: {}", se),
            SdkError::InvalidArgument { message } => format!("invalid argument: {}", message),
            SdkError::Refusal { message } => format!("refusal: {}", message),
            SdkError::OutputParse { text, message } => {
                format!("output parse error: {} [text: {}]", message, text)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http status {status}: {sanitized}")]
    HttpStatus {
        status: u16,
        /// upstream body (should be treated as sensitive; only log sanitized)
        body: String,
        /// Retry-After header (ms) if available
        retry_after_ms: Option<u64>,
        /// Sanitized message for display
        sanitized: String,
        /// Upstream response headers (lowercased keys where possible)
        headers: Vec<(String, String)>,
    },
    #[error("network: {0}")]
    Network(String),
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),
    #[error("idle read timeout after {0:?}")]
    IdleReadTimeout(Duration),
    #[error("body read error: {0}")]
    BodyRead(String),
    #[error("stream closed")]
    StreamClosed,
    #[error("other: {0}")]
    Other(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            TransportError::HttpStatus { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
    pub fn sanitized_message(&self) -> String {
        match self {
            TransportError::HttpStatus { status, .. } => format!("http status {status}"),
            _ => self.to_string(),
        }
    }
}

pub fn http_status_fallback_message(status: u16) -> String {
    format!("http status {status}")
}

pub fn build_http_status_transport_error(
    status: u16,
    body: String,
    retry_after_ms: Option<u64>,
    headers: Vec<(String, String)>,
) -> TransportError {
    TransportError::HttpStatus {
        status,
        body,
        retry_after_ms,
        sanitized: http_status_fallback_message(status),
        headers,
    }
}

pub fn map_http_status_to_upstream_error(
    status: u16,
    body: String,
    retry_after_ms: Option<u64>,
    headers: Vec<(String, String)>,
    message: Option<String>,
) -> SdkError {
    let fallback = http_status_fallback_message(status);
    let source = build_http_status_transport_error(status, body, retry_after_ms, headers);
    SdkError::Upstream {
        status,
        message: message.unwrap_or(fallback),
        source: Some(Box::new(source)),
    }
}

pub fn map_http_status_to_rate_limited_error(
    status: u16,
    body: String,
    retry_after_ms: Option<u64>,
    headers: Vec<(String, String)>,
) -> SdkError {
    let source = build_http_status_transport_error(status, body, retry_after_ms, headers);
    SdkError::RateLimited {
        retry_after_ms,
        source: Some(Box::new(source)),
    }
}

pub fn display_body_for_error(body: &str) -> String {
    let trimmed = body.trim();
    let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');
    if looks_like_json {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(v) => v.to_string(), // minified JSON
            Err(_) => format!("{} bytes", body.len()),
        }
    } else {
        format!("{} bytes", body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        build_http_status_transport_error, http_status_fallback_message,
        map_http_status_to_rate_limited_error, map_http_status_to_upstream_error, SdkError,
        TransportError,
    };
    use crate::core::retry::Retryable;

    #[test]
    fn retryable_classification_splits_client_and_server_faults() {
        let server = map_http_status_to_upstream_error(502, String::new(), None, Vec::new(), None);
        let client = map_http_status_to_upstream_error(400, String::new(), None, Vec::new(), None);
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(SdkError::Timeout.is_retryable());
        assert!(SdkError::Transport(TransportError::Network("reset".into())).is_retryable());
        assert!(!SdkError::Cancelled.is_retryable());
        assert!(!SdkError::Refusal {
            message: "no".into()
        }
        .is_retryable());
        assert!(!SdkError::invalid_argument("bad").is_retryable());
    }

    #[test]
    fn rate_limited_exposes_retry_after_to_backoff() {
        let mapped =
            map_http_status_to_rate_limited_error(429, "slow down".into(), Some(700), Vec::new());
        assert!(mapped.is_retryable());
        assert_eq!(Retryable::retry_after_ms(&mapped), Some(700));
    }

    #[test]
    fn upstream_keeps_status_source_and_message() {
        let with_message = map_http_status_to_upstream_error(
            404,
            r#"{"errors":[{"code":"model_not_supported"}]}"#.into(),
            None,
            Vec::new(),
            Some("model_not_supported: unknown model".into()),
        );
        let SdkError::Upstream {
            status,
            message,
            source,
        } = with_message
        else {
            panic!("expected upstream error");
        };
        assert_eq!(status, 404);
        assert_eq!(message, "model_not_supported: unknown model");
        assert!(matches!(
            source.as_deref(),
            Some(TransportError::HttpStatus { sanitized, .. }) if sanitized == "http status 404"
        ));

        let bare = map_http_status_to_upstream_error(503, "busy".into(), None, Vec::new(), None);
        assert!(matches!(bare, SdkError::Upstream { ref message, .. } if message == &http_status_fallback_message(503)));
        assert!(bare.format_details().contains("[body: busy]"));
    }

    #[test]
    fn transport_error_reports_status_and_retry_hint() {
        let built = build_http_status_transport_error(429, "quota".into(), Some(10), Vec::new());
        assert_eq!(built.status(), Some(429));
        assert_eq!(built.retry_after_ms(), Some(10));
        assert_eq!(built.sanitized_message(), "http status 429");
        assert_eq!(TransportError::StreamClosed.status(), None);
    }
}
