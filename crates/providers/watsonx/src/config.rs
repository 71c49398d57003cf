use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai_sdk_core::dispatch::RequestDispatcher;
use crate::ai_sdk_core::transport::TransportConfig;
use crate::ai_sdk_core::SdkError;
use crate::provider_watsonx::auth::WatsonxAuth;

pub const DEFAULT_VERSION: &str = "2024-05-31";

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// Resource context a call is billed and executed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Project(String),
    Space(String),
    /// Deployment id or serving name; the model is fixed by the deployment.
    Deployment(String),
}

impl Scope {
    /// Exactly one of the identifiers must be set (empty strings count as unset).
    pub fn resolve(
        project_id: Option<&str>,
        space_id: Option<&str>,
        id_or_name: Option<&str>,
    ) -> Result<Scope, SdkError> {
        let set = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        match (set(project_id), set(space_id), set(id_or_name)) {
            (Some(p), None, None) => Ok(Scope::Project(p)),
            (None, Some(s), None) => Ok(Scope::Space(s)),
            (None, None, Some(d)) => Ok(Scope::Deployment(d)),
            (None, None, None) => Err(SdkError::invalid_argument(
                "no scope specified: set one of project_id, space_id or id_or_name",
            )),
            _ => Err(SdkError::invalid_argument(
                "only one of project_id, space_id or id_or_name can be set per instance",
            )),
        }
    }

    /// Body field naming the scope, absent for deployments.
    pub fn body_field(&self) -> Option<(&'static str, &str)> {
        match self {
            Scope::Project(id) => Some(("project_id", id.as_str())),
            Scope::Space(id) => Some(("space_id", id.as_str())),
            Scope::Deployment(_) => None,
        }
    }

    pub fn deployment(&self) -> Option<&str> {
        match self {
            Scope::Deployment(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Connection and execution settings shared by every watsonx model handle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatsonxConfig {
    /// e.g. `https://us-south.ml.cloud.ibm.com`
    pub service_url: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_or_name: Option<String>,
    #[serde(default)]
    pub auth: WatsonxAuth,
    /// Retries after the first attempt; 0 disables retrying.
    #[serde(default)]
    pub max_retries: u32,
    /// Max in-flight calls per handle; `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_idle_timeout_ms: Option<u64>,
}

impl WatsonxConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            version: default_version(),
            project_id: None,
            space_id: None,
            id_or_name: None,
            auth: WatsonxAuth::default(),
            max_retries: 0,
            max_concurrency: None,
            stream_idle_timeout_ms: None,
        }
    }

    pub fn with_project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    pub fn with_space_id(mut self, id: impl Into<String>) -> Self {
        self.space_id = Some(id.into());
        self
    }

    pub fn with_id_or_name(mut self, id: impl Into<String>) -> Self {
        self.id_or_name = Some(id.into());
        self
    }

    pub fn with_auth(mut self, auth: WatsonxAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn scope(&self) -> Result<Scope, SdkError> {
        Scope::resolve(
            self.project_id.as_deref(),
            self.space_id.as_deref(),
            self.id_or_name.as_deref(),
        )
    }

    pub fn dispatcher(&self) -> RequestDispatcher {
        RequestDispatcher::new(self.max_retries, self.max_concurrency)
    }

    pub fn transport_config(&self) -> TransportConfig {
        match self.stream_idle_timeout_ms {
            Some(ms) => TransportConfig::with_idle_read_timeout(Duration::from_millis(ms)),
            None => TransportConfig::default(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SdkError> {
        if self.service_url.trim().is_empty() {
            return Err(SdkError::invalid_argument("watsonx requires service_url"));
        }
        url::Url::parse(&self.service_url).map_err(|e| {
            SdkError::invalid_argument(format!("invalid watsonx service_url: {e}"))
        })?;
        if self.version.trim().is_empty() {
            return Err(SdkError::invalid_argument("watsonx requires an API version"));
        }
        Ok(())
    }
}
