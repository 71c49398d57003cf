use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ai_sdk_core::chat::{ChatModel, ChatStream};
use crate::ai_sdk_core::stream_collect::collect_chat_candidates;
use crate::ai_sdk_core::transport::HttpTransport;
use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_types::usage::from_watsonx_chat;
use crate::ai_sdk_types::{ChatGeneration, ChatMessage, ChatResult};
use crate::provider_watsonx::api_types::ChatResponse;
use crate::provider_watsonx::chat::convert::{choice_to_message, convert_to_watsonx_messages};
use crate::provider_watsonx::chat::stream::build_chat_stream;
use crate::provider_watsonx::config::{Scope, WatsonxConfig};
use crate::provider_watsonx::params::ChatParams;
use crate::provider_watsonx::service::{insert_scope, WatsonxService};
use crate::provider_watsonx::tools::convert::{convert_tools, ToolDefinition};
use crate::provider_watsonx::tools::tool_call_id::requires_tool_call_id_remap;

pub const DEFAULT_CHAT_MODEL: &str = "mistralai/mistral-large";

/// Per-call overrides for [`ChatWatsonx`].
#[derive(Debug, Clone, Default)]
pub struct ChatCallOptions {
    pub params: ChatParams,
    /// Replaces the bound tools for this call.
    pub tools: Option<Vec<ToolDefinition>>,
    pub signal: Option<CancellationToken>,
}

impl ChatCallOptions {
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Chat model served by `text/chat`, or by a deployment's chat endpoint.
pub struct ChatWatsonx<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    model_id: String,
    service: Arc<WatsonxService<T>>,
    scope: Scope,
    defaults: ChatParams,
    tools: Vec<ToolDefinition>,
    streaming: bool,
}

impl<T: HttpTransport> Clone for ChatWatsonx<T> {
    fn clone(&self) -> Self {
        Self {
            model_id: self.model_id.clone(),
            service: Arc::clone(&self.service),
            scope: self.scope.clone(),
            defaults: self.defaults.clone(),
            tools: self.tools.clone(),
            streaming: self.streaming,
        }
    }
}

impl ChatWatsonx<crate::reqwest_transport::ReqwestTransport> {
    pub fn from_config(config: WatsonxConfig) -> Result<Self, SdkError> {
        Self::new(Arc::new(WatsonxService::new(config)?))
    }
}

impl<T: HttpTransport> ChatWatsonx<T> {
    /// Fails unless the service config names exactly one scope.
    pub fn new(service: Arc<WatsonxService<T>>) -> Result<Self, SdkError> {
        let scope = service.config().scope()?;
        Ok(Self {
            model_id: DEFAULT_CHAT_MODEL.to_string(),
            service,
            scope,
            defaults: ChatParams::default(),
            tools: Vec::new(),
            streaming: false,
        })
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_params(mut self, params: ChatParams) -> Self {
        self.defaults = params;
        self
    }

    /// Serve `generate` by streaming and collecting the chunks.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Copy of this model with `tools` attached to every call.
    pub fn bind_tools<I>(&self, tools: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ToolDefinition>,
    {
        let mut bound = self.clone();
        bound.tools = tools.into_iter().map(Into::into).collect();
        bound
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn service(&self) -> &Arc<WatsonxService<T>> {
        &self.service
    }

    pub fn build_request_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatCallOptions,
    ) -> Result<JsonValue, SdkError> {
        let remap_ids = requires_tool_call_id_remap(&self.model_id);
        let mut body = match serde_json::to_value(ChatParams::merged(&self.defaults, &options.params))? {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        body.insert(
            "messages".into(),
            JsonValue::Array(convert_to_watsonx_messages(messages, remap_ids)?),
        );
        if self.scope.deployment().is_none() {
            body.insert("model_id".into(), json!(self.model_id));
            insert_scope(&mut body, &self.scope);
        }
        let tools = options.tools.as_deref().unwrap_or(&self.tools);
        if !tools.is_empty() {
            body.insert("tools".into(), serde_json::to_value(convert_tools(tools))?);
        }
        Ok(JsonValue::Object(body))
    }

    async fn open_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatCallOptions,
    ) -> Result<ChatStream, SdkError> {
        let body = &self.build_request_body(messages, options)?;
        debug!(
            "[WATSONX]: chat stream model={} messages={}",
            self.model_id,
            messages.len()
        );
        let service = &self.service;
        let scope = &self.scope;
        let bytes = service
            .dispatcher()
            .call(options.signal.as_ref(), move || async move {
                match scope.deployment() {
                    Some(id) => service.deployment_text_chat_stream(id, body).await,
                    None => service.text_chat_stream(body).await,
                }
            })
            .await?;
        Ok(build_chat_stream(bytes, options.signal.clone()))
    }
}

#[async_trait]
impl<T: HttpTransport + Send + Sync> ChatModel for ChatWatsonx<T> {
    type CallOptions = ChatCallOptions;

    fn provider_name(&self) -> &'static str {
        "watsonx"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &ChatCallOptions,
    ) -> Result<ChatResult, SdkError> {
        if self.streaming {
            let stream = self.open_stream(messages, options).await?;
            let generations = collect_chat_candidates(stream).await?;
            let token_usage = generations
                .iter()
                .filter_map(|g| g.message.usage_metadata)
                .reduce(|acc, u| acc + u);
            return Ok(ChatResult {
                generations,
                token_usage,
            });
        }

        let body = &self.build_request_body(messages, options)?;
        debug!(
            "[WATSONX]: chat model={} messages={}",
            self.model_id,
            messages.len()
        );
        let service = &self.service;
        let scope = &self.scope;
        let json = service
            .dispatcher()
            .call(options.signal.as_ref(), move || async move {
                match scope.deployment() {
                    Some(id) => service.deployment_text_chat(id, body).await,
                    None => service.text_chat(body).await,
                }
            })
            .await?;
        let response: ChatResponse = serde_json::from_value(json)?;
        let token_usage = response.usage.as_ref().and_then(from_watsonx_chat);
        let generations = response
            .choices
            .iter()
            .map(|choice| {
                let message = choice_to_message(choice, response.id.as_deref(), token_usage)?;
                Ok(ChatGeneration {
                    text: message.text().to_string(),
                    message,
                    finish_reason: choice.finish_reason.clone(),
                })
            })
            .collect::<Result<Vec<_>, SdkError>>()?;
        Ok(ChatResult {
            generations,
            token_usage,
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatCallOptions,
    ) -> Result<ChatStream, SdkError> {
        self.open_stream(messages, options).await
    }
}
