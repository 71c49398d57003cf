use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::ai_sdk_core::transport::HttpTransport;
use crate::ai_sdk_core::SdkError;
use crate::provider_watsonx::service::WatsonxService;
use crate::provider_watsonx::tools::convert::{ToolDefinition, WatsonxTool};

const TOOL_FAILED: &str = "Sorry, the tool did not work as expected";

/// A server-side utility tool bound to the service that runs it.
pub struct WatsonxUtilityTool<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    descriptor: WatsonxTool,
    /// Compiled from the descriptor's parameters; `None` when the listed
    /// schema does not compile.
    validator: Option<Arc<jsonschema::Validator>>,
    service: Arc<WatsonxService<T>>,
}

impl<T: HttpTransport> Clone for WatsonxUtilityTool<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            validator: self.validator.clone(),
            service: Arc::clone(&self.service),
        }
    }
}

impl<T: HttpTransport> WatsonxUtilityTool<T> {
    fn new(descriptor: WatsonxTool, service: Arc<WatsonxService<T>>) -> Self {
        let validator = match jsonschema::validator_for(&descriptor.function.parameters) {
            Ok(v) => Some(Arc::new(v)),
            Err(e) => {
                warn!(
                    "[WATSONX]: utility tool {} has an unusable input schema: {}",
                    descriptor.function.name, e
                );
                None
            }
        };
        Self {
            descriptor,
            validator,
            service,
        }
    }

    /// Check `args` against the tool's input schema.
    pub fn validate_args(&self, args: &JsonValue) -> Result<(), SdkError> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SdkError::invalid_argument(format!(
                "invalid arguments for tool {}: {}",
                self.name(),
                errors.join(", ")
            )))
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.function.name
    }

    pub fn description(&self) -> &str {
        self.descriptor.function.description.as_deref().unwrap_or("")
    }

    pub fn descriptor(&self) -> &WatsonxTool {
        &self.descriptor
    }

    /// Tool definition for binding to a chat model.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::Provider(self.descriptor.clone())
    }

    /// Run the tool.
    ///
    /// Arguments are validated against the input schema before anything is
    /// sent; `null` counts as an empty object. `input` is sent as the tool
    /// input when present, otherwise all arguments are; the arguments other
    /// than `input` go in `config`.
    /// Returns the text of `output`, or a fixed apology when it is absent.
    pub async fn call(&self, args: JsonValue) -> Result<String, SdkError> {
        let args = match args {
            JsonValue::Null => JsonValue::Object(Map::new()),
            other => other,
        };
        self.validate_args(&args)?;
        let mut rest = match args {
            JsonValue::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("input".into(), other);
                map
            }
        };
        let input = rest.remove("input");
        let config = JsonValue::Object(rest);
        let body = json!({
            "tool_name": self.name(),
            "input": input.unwrap_or_else(|| config.clone()),
            "config": config,
        });
        debug!("[WATSONX]: running utility tool {}", self.name());
        let resp = self
            .service
            .dispatcher()
            .call(None, || self.service.run_utility_agent_tool(self.name(), &body))
            .await?;
        Ok(match resp.get("output") {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => TOOL_FAILED.to_string(),
            Some(other) => other.to_string(),
        })
    }
}

/// Utility tools available to the configured account.
pub struct WatsonxToolkit<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    tools: Vec<WatsonxUtilityTool<T>>,
}

impl<T: HttpTransport> WatsonxToolkit<T> {
    /// Fetch the tool list once.
    pub async fn init(service: Arc<WatsonxService<T>>) -> Result<Self, SdkError> {
        let listed = service
            .dispatcher()
            .call(None, || service.list_utility_agent_tools())
            .await?;
        debug!("[WATSONX]: {} utility tools available", listed.len());
        let tools = listed
            .iter()
            .map(|tool| WatsonxUtilityTool::new(WatsonxTool::from_utility(tool), Arc::clone(&service)))
            .collect();
        Ok(Self { tools })
    }

    pub fn get_tools(&self) -> &[WatsonxUtilityTool<T>] {
        &self.tools
    }

    pub fn get_tool(&self, name: &str) -> Option<&WatsonxUtilityTool<T>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}
