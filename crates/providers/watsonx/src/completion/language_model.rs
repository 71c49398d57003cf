use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::{json, Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ai_sdk_core::completion::{CompletionModel, GenerationStream};
use crate::ai_sdk_core::transport::HttpTransport;
use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_types::{Generation, LlmResult, TokenUsage};
use crate::provider_watsonx::api_types::{FoundationModelSpec, TokenizationResponse};
use crate::provider_watsonx::completion::stream::{
    build_generation_stream, parse_generation_response,
};
use crate::provider_watsonx::config::{Scope, WatsonxConfig};
use crate::provider_watsonx::params::TextGenParameters;
use crate::provider_watsonx::service::{insert_scope, WatsonxService};

pub const DEFAULT_LLM_MODEL: &str = "google/flan-ul2";
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 100;

/// Per-call overrides for [`WatsonxLlm`].
#[derive(Debug, Clone, Default)]
pub struct LlmCallOptions {
    pub params: TextGenParameters,
    /// Stop sequences; take precedence over `params.stop_sequences`.
    pub stop: Option<Vec<String>>,
    /// Route this call to a deployment regardless of the handle's scope.
    pub id_or_name: Option<String>,
    pub signal: Option<CancellationToken>,
}

/// Where a single request goes.
#[derive(Clone, Copy)]
enum Target<'a> {
    Model,
    Deployment(&'a str),
}

/// Plain text-generation model.
pub struct WatsonxLlm<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    model_id: String,
    service: Arc<WatsonxService<T>>,
    scope: Scope,
    defaults: TextGenParameters,
}

impl WatsonxLlm<crate::reqwest_transport::ReqwestTransport> {
    pub fn from_config(config: WatsonxConfig) -> Result<Self, SdkError> {
        Self::new(Arc::new(WatsonxService::new(config)?))
    }
}

impl<T: HttpTransport> WatsonxLlm<T> {
    pub fn new(service: Arc<WatsonxService<T>>) -> Result<Self, SdkError> {
        let scope = service.config().scope()?;
        Ok(Self {
            model_id: DEFAULT_LLM_MODEL.to_string(),
            service,
            scope,
            defaults: TextGenParameters {
                max_new_tokens: Some(DEFAULT_MAX_NEW_TOKENS),
                ..Default::default()
            },
        })
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Instance defaults; an unset `max_new_tokens` falls back to 100.
    pub fn with_params(mut self, mut params: TextGenParameters) -> Self {
        params.max_new_tokens.get_or_insert(DEFAULT_MAX_NEW_TOKENS);
        self.defaults = params;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn invocation_params(&self, options: &LlmCallOptions) -> TextGenParameters {
        let mut params = TextGenParameters::merged(&self.defaults, &options.params);
        if let Some(stop) = &options.stop {
            params.stop_sequences = Some(stop.clone());
        }
        params
    }

    fn target<'a>(&'a self, options: &'a LlmCallOptions) -> Target<'a> {
        match options.id_or_name.as_deref().or(self.scope.deployment()) {
            Some(id) => Target::Deployment(id),
            None => Target::Model,
        }
    }

    /// Request body for one prompt.
    ///
    /// Deployment calls bind the prompt as `prompt_variables.input` and send
    /// neither model id nor scope.
    pub fn build_request_body(&self, prompt: &str, options: &LlmCallOptions) -> Result<JsonValue, SdkError> {
        let params = self.invocation_params(options);
        let mut body = Map::new();
        match self.target(options) {
            Target::Deployment(_) => {
                body.insert("parameters".into(), serde_json::to_value(params.with_prompt_input(prompt))?);
            }
            Target::Model => {
                body.insert("input".into(), json!(prompt));
                body.insert("model_id".into(), json!(self.model_id));
                body.insert("parameters".into(), serde_json::to_value(params)?);
                insert_scope(&mut body, &self.scope);
            }
        }
        Ok(JsonValue::Object(body))
    }

    async fn generate_one(
        &self,
        prompt: &str,
        options: &LlmCallOptions,
    ) -> Result<(Vec<Generation>, TokenUsage), SdkError> {
        if options.signal.as_ref().is_some_and(|s| s.is_cancelled()) {
            return Err(SdkError::Cancelled);
        }
        let body = &self.build_request_body(prompt, options)?;
        let service = &self.service;
        let target = self.target(options);
        let json = service
            .dispatcher()
            .call(options.signal.as_ref(), move || async move {
                match target {
                    Target::Deployment(id) => service.deployment_generate_text(id, body).await,
                    Target::Model => service.generate_text(body).await,
                }
            })
            .await?;
        Ok(parse_generation_response(&json))
    }

    /// Token count of `text` under this model.
    pub async fn get_num_tokens(&self, text: &str) -> Result<u64, SdkError> {
        if self.scope.deployment().is_some() {
            return Err(SdkError::invalid_argument(
                "tokenization is not available for deployments",
            ));
        }
        let mut body = Map::new();
        body.insert("input".into(), json!(text));
        body.insert("model_id".into(), json!(self.model_id));
        insert_scope(&mut body, &self.scope);
        let body = JsonValue::Object(body);
        let service = &self.service;
        let json = service
            .dispatcher()
            .call(None, || service.tokenize(&body))
            .await?;
        let resp: TokenizationResponse = serde_json::from_value(json)?;
        Ok(resp.result.token_count)
    }

    /// Foundation models that support text generation.
    pub async fn list_models(&self) -> Result<Vec<FoundationModelSpec>, SdkError> {
        let specs = self
            .service
            .list_foundation_model_specs(Some("function_text_generation"))
            .await?;
        Ok(specs.resources)
    }
}

#[async_trait]
impl<T: HttpTransport + Send + Sync> CompletionModel for WatsonxLlm<T> {
    type CallOptions = LlmCallOptions;

    fn provider_name(&self) -> &'static str {
        "watsonx"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Prompts are sent concurrently under the dispatcher's limit; the
    /// result keeps prompt order.
    async fn generate(
        &self,
        prompts: &[String],
        options: &LlmCallOptions,
    ) -> Result<LlmResult, SdkError> {
        debug!(
            "[WATSONX]: generate model={} prompts={}",
            self.model_id,
            prompts.len()
        );
        let per_prompt = try_join_all(prompts.iter().map(|p| self.generate_one(p, options))).await?;
        let mut token_usage = TokenUsage::default();
        let mut generations = Vec::with_capacity(per_prompt.len());
        for (gens, usage) in per_prompt {
            token_usage += usage;
            generations.push(gens);
        }
        Ok(LlmResult {
            generations,
            token_usage,
        })
    }

    async fn stream(
        &self,
        prompt: &str,
        options: &LlmCallOptions,
    ) -> Result<GenerationStream, SdkError> {
        let body = &self.build_request_body(prompt, options)?;
        let service = &self.service;
        let target = self.target(options);
        let bytes = service
            .dispatcher()
            .call(options.signal.as_ref(), move || async move {
                match target {
                    Target::Deployment(id) => {
                        service.deployment_generate_text_stream(id, body).await
                    }
                    Target::Model => service.generate_text_stream(body).await,
                }
            })
            .await?;
        Ok(build_generation_stream(bytes, options.signal.clone()))
    }
}
