use crate::ai_sdk_core::error::{build_http_status_transport_error, TransportError};
use crate::ai_sdk_core::transport::{HttpTransport, TransportConfig};
use crate::provider_watsonx::auth::WatsonxAuth;
use crate::provider_watsonx::config::WatsonxConfig;
use crate::provider_watsonx::service::WatsonxService;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use futures_util::stream;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub const SERVICE_URL: &str = "https://us-south.ml.cloud.ibm.com";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &JsonValue {
        self.body.as_ref().expect("request had no json body")
    }
}

type Responder = Box<dyn Fn(&str, &JsonValue) -> Result<JsonValue, TransportError> + Send + Sync>;

/// In-memory transport: replies are served from queues in FIFO order and
/// every request is recorded.
#[derive(Clone, Default)]
pub struct TestTransport {
    responses: Arc<Mutex<VecDeque<Result<JsonValue, TransportError>>>>,
    streams: Arc<Mutex<VecDeque<Vec<Result<Bytes, TransportError>>>>>,
    token_responses: Arc<Mutex<VecDeque<JsonValue>>>,
    responder: Arc<Mutex<Option<Responder>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, body: JsonValue) {
        self.responses.lock().unwrap().push_back(Ok(body));
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(build_http_status_transport_error(
                status,
                body.to_string(),
                None,
                vec![],
            )));
    }

    /// Queue one streaming response; each item is delivered as one packet.
    pub fn push_stream<I, S>(&self, packets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = packets
            .into_iter()
            .map(|p| Ok(Bytes::from(p.into())))
            .collect();
        self.streams.lock().unwrap().push_back(chunks);
    }

    pub fn push_token(&self, body: JsonValue) {
        self.token_responses.lock().unwrap().push_back(body);
    }

    /// Answer JSON requests from a closure once the queue is empty.
    pub fn respond_with<F>(&self, f: F)
    where
        F: Fn(&str, &JsonValue) -> Result<JsonValue, TransportError> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some(Box::new(f));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }

    /// Requests whose url contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(fragment))
            .collect()
    }

    fn record(
        &self,
        method: &'static str,
        url: &str,
        headers: &[(String, String)],
        body: Option<&JsonValue>,
        form: &[(String, String)],
    ) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.cloned(),
            form: form.to_vec(),
        });
    }

    fn next_json(&self, url: &str, body: &JsonValue) -> Result<JsonValue, TransportError> {
        if let Some(queued) = self.responses.lock().unwrap().pop_front() {
            return queued;
        }
        match self.responder.lock().unwrap().as_ref() {
            Some(f) => f(url, body),
            None => Err(TransportError::Other(format!("no response queued for {url}"))),
        }
    }
}

pub struct TestStreamResponse {
    chunks: Vec<Result<Bytes, TransportError>>,
}

#[async_trait]
impl HttpTransport for TestTransport {
    type StreamResponse = TestStreamResponse;

    fn into_stream(
        resp: Self::StreamResponse,
    ) -> (
        Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
        Vec<(String, String)>,
    ) {
        (Box::pin(stream::iter(resp.chunks)), vec![])
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &JsonValue,
        _cfg: &TransportConfig,
    ) -> Result<Self::StreamResponse, TransportError> {
        self.record("POST", url, headers, Some(body), &[]);
        {
            let mut responses = self.responses.lock().unwrap();
            if matches!(responses.front(), Some(Err(_))) {
                if let Some(Err(e)) = responses.pop_front() {
                    return Err(e);
                }
            }
        }
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Other(format!("no stream queued for {url}")))?;
        Ok(TestStreamResponse { chunks })
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &JsonValue,
        _cfg: &TransportConfig,
    ) -> Result<(JsonValue, Vec<(String, String)>), TransportError> {
        self.record("POST", url, headers, Some(body), &[]);
        Ok((self.next_json(url, body)?, vec![]))
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        fields: &[(String, String)],
        _cfg: &TransportConfig,
    ) -> Result<(JsonValue, Vec<(String, String)>), TransportError> {
        self.record("POST", url, headers, None, fields);
        let body = self
            .token_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                json!({
                    "access_token": "iam-token",
                    "token_type": "Bearer",
                    "expiration": chrono::Utc::now().timestamp() + 3600
                })
            });
        Ok((body, vec![]))
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        _cfg: &TransportConfig,
    ) -> Result<(JsonValue, Vec<(String, String)>), TransportError> {
        self.record("GET", url, headers, None, &[]);
        Ok((self.next_json(url, &JsonValue::Null)?, vec![]))
    }
}

/// Project-scoped config with a static bearer token.
pub fn project_config() -> WatsonxConfig {
    WatsonxConfig::new(SERVICE_URL)
        .with_project_id("proj-1")
        .with_auth(WatsonxAuth::bearer("test-token"))
}

pub fn deployment_config(id: &str) -> WatsonxConfig {
    WatsonxConfig::new(SERVICE_URL)
        .with_id_or_name(id)
        .with_auth(WatsonxAuth::bearer("test-token"))
}

pub fn service(transport: &TestTransport, config: WatsonxConfig) -> Arc<WatsonxService<TestTransport>> {
    Arc::new(WatsonxService::with_transport(config, transport.clone()).expect("service"))
}

/// Frame JSON payloads the way the streaming endpoints do.
pub fn records(payloads: &[JsonValue]) -> Vec<String> {
    payloads
        .iter()
        .enumerate()
        .map(|(i, p)| format!("id: {}\nevent: message\ndata: {}\n\n", i + 1, p))
        .collect()
}
