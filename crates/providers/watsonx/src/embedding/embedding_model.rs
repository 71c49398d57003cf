use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::ai_sdk_core::embedding::EmbeddingModel;
use crate::ai_sdk_core::transport::HttpTransport;
use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_types::embedding::{EmbedResponse, EmbedUsage, Embedding};
use crate::provider_watsonx::api_types::{EmbeddingsResponse, FoundationModelSpec};
use crate::provider_watsonx::config::{Scope, WatsonxConfig};
use crate::provider_watsonx::params::EmbeddingParameters;
use crate::provider_watsonx::service::{insert_scope, WatsonxService};

pub const DEFAULT_EMBEDDING_MODEL: &str = "ibm/slate-125m-english-rtrvr";

pub struct WatsonxEmbeddings<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    model_id: String,
    service: Arc<WatsonxService<T>>,
    scope: Scope,
    params: EmbeddingParameters,
}

impl WatsonxEmbeddings<crate::reqwest_transport::ReqwestTransport> {
    pub fn from_config(config: WatsonxConfig) -> Result<Self, SdkError> {
        Self::new(Arc::new(WatsonxService::new(config)?))
    }
}

impl<T: HttpTransport> WatsonxEmbeddings<T> {
    /// Embeddings run under a project or space; deployments are rejected.
    pub fn new(service: Arc<WatsonxService<T>>) -> Result<Self, SdkError> {
        let scope = service.config().scope()?;
        if scope.deployment().is_some() {
            return Err(SdkError::invalid_argument(
                "embeddings require project_id or space_id",
            ));
        }
        Ok(Self {
            model_id: DEFAULT_EMBEDDING_MODEL.to_string(),
            service,
            scope,
            params: EmbeddingParameters::default(),
        })
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_params(mut self, params: EmbeddingParameters) -> Self {
        self.params = params;
        self
    }

    pub fn build_request_body(&self, texts: &[String]) -> Result<JsonValue, SdkError> {
        let mut body = Map::new();
        body.insert("inputs".into(), json!(texts));
        body.insert("model_id".into(), json!(self.model_id));
        insert_scope(&mut body, &self.scope);
        if !self.params.is_empty() {
            body.insert("parameters".into(), serde_json::to_value(&self.params)?);
        }
        Ok(JsonValue::Object(body))
    }

    /// Vectors in input order plus the reported input token count.
    pub async fn embed_with_usage(&self, texts: &[String]) -> Result<EmbedResponse, SdkError> {
        if texts.is_empty() {
            return Ok(EmbedResponse::default());
        }
        debug!(
            "[WATSONX]: embed model={} inputs={}",
            self.model_id,
            texts.len()
        );
        let body = &self.build_request_body(texts)?;
        let service = &self.service;
        let json = service
            .dispatcher()
            .call(None, move || service.embed_text(body))
            .await?;
        let parsed: EmbeddingsResponse = serde_json::from_value(json)?;
        if parsed.results.len() != texts.len() {
            return Err(SdkError::Upstream {
                status: 200,
                message: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    parsed.results.len()
                ),
                source: None,
            });
        }
        Ok(EmbedResponse {
            embeddings: parsed.results.into_iter().map(|r| r.embedding).collect(),
            usage: EmbedUsage {
                input_token_count: parsed.input_token_count,
            },
        })
    }

    /// Foundation models that support embeddings.
    pub async fn list_models(&self) -> Result<Vec<FoundationModelSpec>, SdkError> {
        let specs = self
            .service
            .list_foundation_model_specs(Some("function_embedding"))
            .await?;
        Ok(specs.resources)
    }
}

#[async_trait::async_trait]
impl<T: HttpTransport + Send + Sync> EmbeddingModel for WatsonxEmbeddings<T> {
    fn provider_name(&self) -> &'static str {
        "watsonx"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, SdkError> {
        Ok(self.embed_with_usage(texts).await?.embeddings)
    }
}
