//! Authenticated HTTP client for the watsonx.ai REST API.
//!
//! The service owns the transport, the token cache and the request
//! dispatcher. Model handles hold it behind an `Arc` so that every handle
//! built from one service shares credentials and the concurrency limit.

use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::ai_sdk_core::dispatch::RequestDispatcher;
use crate::ai_sdk_core::transport::{HttpTransport, TransportConfig};
use crate::ai_sdk_core::SdkError;
use crate::provider_watsonx::api_types::{
    FoundationModelSpecs, UtilityAgentTool, UtilityAgentTools,
};
use crate::provider_watsonx::auth::{select_authenticator, TokenManager};
use crate::provider_watsonx::config::{Scope, WatsonxConfig};
use crate::provider_watsonx::error::map_transport_error_to_sdk_error;

/// Raw response body of a streaming endpoint.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, SdkError>> + Send>>;

pub struct WatsonxService<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    config: WatsonxConfig,
    http: T,
    tokens: TokenManager,
    transport_cfg: TransportConfig,
    dispatcher: RequestDispatcher,
}

impl WatsonxService<crate::reqwest_transport::ReqwestTransport> {
    /// Service backed by a fresh reqwest client.
    pub fn new(config: WatsonxConfig) -> Result<Self, SdkError> {
        let http = crate::reqwest_transport::ReqwestTransport::try_new(&config.transport_config())?;
        Self::with_transport(config, http)
    }
}

impl<T: HttpTransport> WatsonxService<T> {
    /// Validate the configuration and resolve the authenticator.
    ///
    /// Credentials are not exchanged until the first request.
    pub fn with_transport(config: WatsonxConfig, http: T) -> Result<Self, SdkError> {
        config.validate()?;
        let authenticator = select_authenticator(&config.auth)?;
        debug!(
            "[WATSONX]: service {} (version {}) using {:?}",
            config.service_url, config.version, authenticator
        );
        Ok(Self {
            transport_cfg: config.transport_config(),
            dispatcher: config.dispatcher(),
            tokens: TokenManager::new(authenticator),
            config,
            http,
        })
    }

    /// Share a dispatcher (and its concurrency slots) with other services.
    pub fn with_dispatcher(mut self, dispatcher: RequestDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &WatsonxConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    fn base(&self) -> &str {
        self.config.service_url.trim_end_matches('/')
    }

    fn ml_url(&self, path: &str) -> String {
        format!(
            "{}/ml/v1/{}?version={}",
            self.base(),
            path,
            urlencoding::encode(&self.config.version)
        )
    }

    fn deployment_url(&self, id_or_name: &str, path: &str) -> String {
        self.ml_url(&format!(
            "deployments/{}/{}",
            urlencoding::encode(id_or_name),
            path
        ))
    }

    async fn headers(&self, accept: &str, json_body: bool) -> Result<Vec<(String, String)>, SdkError> {
        let mut headers = vec![("accept".to_string(), accept.to_string())];
        if json_body {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(value) = self
            .tokens
            .authorization(&self.http, &self.transport_cfg)
            .await?
        {
            headers.push(("authorization".to_string(), value));
        }
        Ok(headers)
    }

    /// Map a failed call, dropping the cached token on 401 so the next
    /// attempt re-authenticates.
    async fn fail(&self, err: crate::ai_sdk_core::TransportError) -> SdkError {
        let err = map_transport_error_to_sdk_error(err);
        if matches!(err, SdkError::Unauthorized) {
            self.tokens.invalidate().await;
        }
        err
    }

    async fn post(&self, url: &str, body: &JsonValue) -> Result<JsonValue, SdkError> {
        let headers = self.headers("application/json", true).await?;
        debug!("[WATSONX]: POST {}", url);
        match self
            .http
            .post_json(url, &headers, body, &self.transport_cfg)
            .await
        {
            Ok((json, _)) => Ok(json),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn post_stream(&self, url: &str, body: &JsonValue) -> Result<ByteStream, SdkError> {
        let headers = self.headers("text/event-stream", true).await?;
        debug!("[WATSONX]: POST (stream) {}", url);
        match self
            .http
            .post_json_stream(url, &headers, body, &self.transport_cfg)
            .await
        {
            Ok(resp) => {
                let (inner, _) = T::into_stream(resp);
                Ok(Box::pin(inner.map(|r| r.map_err(map_transport_error_to_sdk_error))))
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn get(&self, url: &str) -> Result<JsonValue, SdkError> {
        let headers = self.headers("application/json", false).await?;
        debug!("[WATSONX]: GET {}", url);
        match self.http.get_json(url, &headers, &self.transport_cfg).await {
            Ok((json, _)) => Ok(json),
            Err(e) => Err(self.fail(e).await),
        }
    }

    pub async fn text_chat(&self, body: &JsonValue) -> Result<JsonValue, SdkError> {
        self.post(&self.ml_url("text/chat"), body).await
    }

    pub async fn text_chat_stream(&self, body: &JsonValue) -> Result<ByteStream, SdkError> {
        self.post_stream(&self.ml_url("text/chat_stream"), body).await
    }

    pub async fn deployment_text_chat(
        &self,
        id_or_name: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, SdkError> {
        self.post(&self.deployment_url(id_or_name, "text/chat"), body)
            .await
    }

    pub async fn deployment_text_chat_stream(
        &self,
        id_or_name: &str,
        body: &JsonValue,
    ) -> Result<ByteStream, SdkError> {
        self.post_stream(&self.deployment_url(id_or_name, "text/chat_stream"), body)
            .await
    }

    pub async fn generate_text(&self, body: &JsonValue) -> Result<JsonValue, SdkError> {
        self.post(&self.ml_url("text/generation"), body).await
    }

    pub async fn generate_text_stream(&self, body: &JsonValue) -> Result<ByteStream, SdkError> {
        self.post_stream(&self.ml_url("text/generation_stream"), body)
            .await
    }

    pub async fn deployment_generate_text(
        &self,
        id_or_name: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, SdkError> {
        self.post(&self.deployment_url(id_or_name, "text/generation"), body)
            .await
    }

    pub async fn deployment_generate_text_stream(
        &self,
        id_or_name: &str,
        body: &JsonValue,
    ) -> Result<ByteStream, SdkError> {
        self.post_stream(
            &self.deployment_url(id_or_name, "text/generation_stream"),
            body,
        )
        .await
    }

    pub async fn embed_text(&self, body: &JsonValue) -> Result<JsonValue, SdkError> {
        self.post(&self.ml_url("text/embeddings"), body).await
    }

    pub async fn tokenize(&self, body: &JsonValue) -> Result<JsonValue, SdkError> {
        self.post(&self.ml_url("text/tokenization"), body).await
    }

    /// `filters` uses the provider's filter syntax, e.g. `function_embedding`.
    pub async fn list_foundation_model_specs(
        &self,
        filters: Option<&str>,
    ) -> Result<FoundationModelSpecs, SdkError> {
        let mut url = self.ml_url("foundation_model_specs");
        if let Some(f) = filters.filter(|f| !f.is_empty()) {
            url.push_str("&filters=");
            url.push_str(&urlencoding::encode(f));
        }
        let json = self.get(&url).await?;
        Ok(serde_json::from_value(json)?)
    }

    pub async fn list_utility_agent_tools(&self) -> Result<Vec<UtilityAgentTool>, SdkError> {
        let url = format!("{}/v1-beta/utility_agent_tools", self.base());
        let json = self.get(&url).await?;
        let tools: UtilityAgentTools = serde_json::from_value(json)?;
        Ok(tools.resources)
    }

    pub async fn run_utility_agent_tool(
        &self,
        tool_name: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, SdkError> {
        let url = format!(
            "{}/v1-beta/utility_agent_tools/run/{}",
            self.base(),
            urlencoding::encode(tool_name)
        );
        self.post(&url, body).await
    }
}

impl<T: HttpTransport> std::fmt::Debug for WatsonxService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatsonxService")
            .field("service_url", &self.config.service_url)
            .field("version", &self.config.version)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

/// Add `project_id`/`space_id` to a request body for non-deployment scopes.
pub(crate) fn insert_scope(body: &mut Map<String, JsonValue>, scope: &Scope) {
    if let Some((key, id)) = scope.body_field() {
        body.insert(key.to_string(), JsonValue::String(id.to_string()));
    }
}
