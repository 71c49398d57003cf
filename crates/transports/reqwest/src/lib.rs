use crate::ai_sdk_core::error::{display_body_for_error, TransportError};
use crate::ai_sdk_core::transport::{
    emit_transport_event, HttpTransport, TransportBody, TransportConfig, TransportEvent,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::error::Error as StdError;
use std::pin::Pin;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

const LOG_TARGET: &str = "watsonx::transport::reqwest";

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    fn configure_builder(
        mut builder: reqwest::ClientBuilder,
        cfg: &TransportConfig,
    ) -> reqwest::ClientBuilder {
        builder = builder
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Duration::from_secs(90));
        if let Some(req_timeout) = cfg.request_timeout {
            builder = builder.timeout(req_timeout);
        }
        builder.connect_timeout(cfg.connect_timeout)
    }

    fn try_new_with_builder(
        cfg: &TransportConfig,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, TransportError> {
        let builder = Self::configure_builder(builder, cfg);
        let client = builder.build().map_err(|err| {
            TransportError::Other(format!(
                "reqwest client build failed: {}",
                format_reqwest_error_chain(&err)
            ))
        })?;
        Ok(Self { client })
    }

    fn new_with_builder(cfg: &TransportConfig, builder: reqwest::ClientBuilder) -> Self {
        match Self::try_new_with_builder(cfg, builder) {
            Ok(transport) => transport,
            Err(err) => {
                debug!(
                    target: LOG_TARGET,
                    error = %err,
                    "falling back to reqwest::Client::new after transport init failure"
                );
                Self {
                    client: Client::new(),
                }
            }
        }
    }

    pub fn try_new(cfg: &TransportConfig) -> Result<Self, TransportError> {
        Self::try_new_with_builder(cfg, Client::builder())
    }

    pub fn new(cfg: &TransportConfig) -> Self {
        Self::new_with_builder(cfg, Client::builder())
    }

    /// Wrap an existing client (shared pools, custom TLS roots).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn with_headers(mut req: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
        for (k, v) in headers {
            // body helpers already set Content-Type
            if !k.eq_ignore_ascii_case("content-type") {
                req = req.header(k, v);
            }
        }
        req
    }

    /// Send the request, report it to the transport observer and turn
    /// non-2xx responses into `TransportError::HttpStatus`.
    async fn send(
        &self,
        req: RequestBuilder,
        mut call: CallRecord,
        cfg: &TransportConfig,
    ) -> Result<(Response, CallRecord), TransportError> {
        if let Some(built) = req.try_clone().and_then(|r| r.build().ok()) {
            call.method = built.method().to_string();
            call.url = built.url().to_string();
            call.request_headers = header_pairs(built.headers());
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                let detail = format_reqwest_error_chain(&e);
                debug!(target: LOG_TARGET, %detail, url = %call.url, "reqwest send failed");
                call.emit(None, Vec::new(), None, Some(detail.clone()));
                return Err(if e.is_connect() {
                    TransportError::Network(format!("connect: {detail}"))
                } else if e.is_timeout() {
                    TransportError::ConnectTimeout(cfg.connect_timeout)
                } else {
                    TransportError::Network(detail)
                });
            }
        };

        let status = resp.status();
        if status.is_success() {
            return Ok((resp, call));
        }

        let retry_after_ms = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_retry_after_ms);
        let res_headers = header_pairs(resp.headers());
        let body_text = resp.text().await.unwrap_or_default();
        let sanitized = display_body_for_error(&body_text);
        debug!(
            target: LOG_TARGET,
            status = status.as_u16(),
            url = %call.url,
            "upstream returned error status"
        );
        call.emit(
            Some(status.as_u16()),
            res_headers.clone(),
            Some((TransportBody::Text(body_text.clone()), body_text.len())),
            Some(format!("HTTP {}: {}", status.as_u16(), sanitized)),
        );
        Err(TransportError::HttpStatus {
            status: status.as_u16(),
            body: body_text,
            retry_after_ms,
            sanitized,
            headers: res_headers,
        })
    }

    /// Read a successful response body as JSON and report it.
    async fn read_json(
        resp: Response,
        call: CallRecord,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        let status = resp.status().as_u16();
        let res_headers = header_pairs(resp.headers());
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::BodyRead(e.to_string()))?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|_| TransportError::BodyRead("invalid json".into()))?;
        call.emit(
            Some(status),
            res_headers.clone(),
            Some((TransportBody::Json(json.clone()), text.len())),
            None,
        );
        Ok((json, res_headers))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

/// Observer bookkeeping for one request.
struct CallRecord {
    started_at: SystemTime,
    start: Instant,
    method: String,
    url: String,
    request_headers: Vec<(String, String)>,
    request_body: Option<TransportBody>,
    is_stream: bool,
}

impl CallRecord {
    fn new(method: &str, url: &str, request_body: Option<TransportBody>, is_stream: bool) -> Self {
        Self {
            started_at: SystemTime::now(),
            start: Instant::now(),
            method: method.to_string(),
            url: url.to_string(),
            request_headers: Vec::new(),
            request_body,
            is_stream,
        }
    }

    fn emit(
        &self,
        status: Option<u16>,
        response_headers: Vec<(String, String)>,
        response: Option<(TransportBody, usize)>,
        error: Option<String>,
    ) {
        let (response_body, response_size) = match response {
            Some((body, size)) => (Some(body), Some(size)),
            None => (None, None),
        };
        emit_transport_event(TransportEvent {
            started_at: self.started_at,
            latency: Some(self.start.elapsed()),
            method: self.method.clone(),
            url: self.url.clone(),
            status,
            request_headers: self.request_headers.clone(),
            response_headers,
            request_body: self.request_body.clone(),
            response_body,
            response_size,
            error,
            is_stream: self.is_stream,
        });
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    type StreamResponse = (
        Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
        Vec<(String, String)>,
    );

    fn into_stream(
        resp: Self::StreamResponse,
    ) -> (
        Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
        Vec<(String, String)>,
    ) {
        resp
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        cfg: &TransportConfig,
    ) -> Result<Self::StreamResponse, TransportError> {
        let cleaned_body = clean_body(body, cfg);
        let req = Self::with_headers(self.client.post(url).json(&cleaned_body), headers);
        let call = CallRecord::new("POST", url, Some(TransportBody::Json(cleaned_body)), true);
        let (resp, call) = self.send(req, call, cfg).await?;

        let res_headers = header_pairs(resp.headers());
        call.emit(Some(resp.status().as_u16()), res_headers.clone(), None, None);

        // Success: stream the bytes with idle timeout enforcement
        let idle = cfg.idle_read_timeout;
        let mut inner = resp.bytes_stream();
        let s = async_stream::try_stream! {
            loop {
                let next = tokio::time::timeout(idle, inner.next()).await;
                match next {
                    Err(_) => Err(TransportError::IdleReadTimeout(idle))?,
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        if e.is_timeout() { Err(TransportError::IdleReadTimeout(idle))?; }
                        else { Err(TransportError::BodyRead(e.to_string()))?; }
                    }
                    Ok(Some(Ok(bytes))) => { yield bytes; }
                }
            }
        };
        Ok((Box::pin(s), res_headers))
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        cfg: &TransportConfig,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        let cleaned_body = clean_body(body, cfg);
        let req = Self::with_headers(self.client.post(url).json(&cleaned_body), headers);
        let call = CallRecord::new("POST", url, Some(TransportBody::Json(cleaned_body)), false);
        let (resp, call) = self.send(req, call, cfg).await?;
        Self::read_json(resp, call).await
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        fields: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        let req = Self::with_headers(self.client.post(url).form(fields), headers)
            .header(reqwest::header::ACCEPT, "application/json");
        // field values are credentials; only names reach the observer
        let names = fields.iter().map(|(k, _)| k.clone()).collect();
        let call = CallRecord::new("POST", url, Some(TransportBody::Form(names)), false);
        let (resp, call) = self.send(req, call, cfg).await?;
        Self::read_json(resp, call).await
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        let req = Self::with_headers(self.client.get(url), headers);
        let call = CallRecord::new("GET", url, None, false);
        let (resp, call) = self.send(req, call, cfg).await?;
        Self::read_json(resp, call).await
    }
}

fn clean_body(body: &Value, cfg: &TransportConfig) -> Value {
    if cfg.strip_null_fields {
        crate::ai_sdk_core::json::without_null_fields(body)
    } else {
        body.clone()
    }
}

/// Header snapshot for observers; credentials are masked.
fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == reqwest::header::AUTHORIZATION {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or_default().to_string()
            };
            (name.to_string(), value)
        })
        .collect()
}

fn parse_retry_after_ms(s: &str) -> Option<u64> {
    // RFC 7231: either delta-seconds or HTTP date; support simple delta only
    s.trim().parse::<u64>().ok().map(|secs| secs * 1000)
}

fn format_reqwest_error_chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(src) = current {
        out.push_str(": ");
        out.push_str(&src.to_string());
        current = src.source();
    }
    out
}
