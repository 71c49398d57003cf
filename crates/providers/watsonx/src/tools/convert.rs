//! Tool descriptors in both directions.
//!
//! Outgoing: caller tools become `{type:"function", function:{...}}`.
//! Incoming: provider tool calls are parsed into valid and invalid calls.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::ai_sdk_core::tool_calls::parse_tool_call;
use crate::ai_sdk_types::json::trim_special_tokens;
use crate::ai_sdk_types::{InvalidToolCall, ToolCall};
use crate::provider_watsonx::api_types::{UtilityAgentTool, WireToolCall};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatsonxFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: JsonValue,
}

/// Function tool in the shape the chat endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatsonxTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WatsonxFunction,
}

impl WatsonxTool {
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: JsonValue,
    ) -> Self {
        Self {
            kind: "function".into(),
            function: WatsonxFunction {
                name: name.into(),
                description,
                parameters,
            },
        }
    }

    /// Descriptor for a server-side utility tool.
    ///
    /// `agent_description` is preferred over `description`. Tools without an
    /// input schema take a single string `input`.
    pub fn from_utility(tool: &UtilityAgentTool) -> Self {
        let description = tool
            .agent_description
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| Some(tool.description.clone()).filter(|d| !d.is_empty()));
        let parameters = match &tool.input_schema {
            Some(schema) => normalize_parameters(schema.clone()),
            None => json!({
                "type": "object",
                "properties": {
                    "input": {"type": "string", "description": "Input to be used when running tool."}
                },
                "required": ["input"]
            }),
        };
        Self::function(&tool.name, description, parameters)
    }
}

/// Caller-defined tool with a JSON schema for its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredTool {
    pub name: String,
    pub description: Option<String>,
    pub schema: JsonValue,
}

impl StructuredTool {
    pub fn new(name: impl Into<String>, description: Option<String>, schema: JsonValue) -> Self {
        Self {
            name: name.into(),
            description,
            schema,
        }
    }

    /// Derive the argument schema from `T`.
    pub fn from_schema<T: JsonSchema>(name: impl Into<String>, description: Option<String>) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({}));
        Self::new(name, description, schema)
    }

    pub fn to_watsonx_tool(&self) -> WatsonxTool {
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("Tool: {}", self.name));
        WatsonxTool::function(
            &self.name,
            Some(description),
            normalize_parameters(self.schema.clone()),
        )
    }
}

/// Either a ready provider descriptor or a caller tool to convert.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDefinition {
    Provider(WatsonxTool),
    Structured(StructuredTool),
}

impl ToolDefinition {
    pub fn name(&self) -> &str {
        match self {
            ToolDefinition::Provider(t) => &t.function.name,
            ToolDefinition::Structured(t) => &t.name,
        }
    }

    pub fn to_watsonx_tool(&self) -> WatsonxTool {
        match self {
            ToolDefinition::Provider(t) => t.clone(),
            ToolDefinition::Structured(t) => t.to_watsonx_tool(),
        }
    }
}

impl From<WatsonxTool> for ToolDefinition {
    fn from(t: WatsonxTool) -> Self {
        ToolDefinition::Provider(t)
    }
}

impl From<StructuredTool> for ToolDefinition {
    fn from(t: StructuredTool) -> Self {
        ToolDefinition::Structured(t)
    }
}

pub fn convert_tools(tools: &[ToolDefinition]) -> Vec<WatsonxTool> {
    tools.iter().map(ToolDefinition::to_watsonx_tool).collect()
}

/// Strip generator metadata and make sure the schema describes an object.
pub fn normalize_parameters(schema: JsonValue) -> JsonValue {
    let mut map = match schema {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    };
    map.remove("$schema");
    map.remove("title");
    map.entry("type".to_string())
        .or_insert_with(|| JsonValue::String("object".into()));
    map.entry("properties".to_string())
        .or_insert_with(|| JsonValue::Object(Map::new()));
    JsonValue::Object(map)
}

/// Provider tool calls split into parsed and rejected entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedToolCalls {
    pub valid: Vec<ToolCall>,
    pub invalid: Vec<InvalidToolCall>,
}

/// Parse every call; failures are kept as invalid calls.
///
/// Arguments are parsed strictly. Only when that fails and the text is
/// wrapped in model special tokens (such as a trailing `<|tool_call_end|>`)
/// is the unwrapped text tried; invalid calls always keep the raw text.
pub fn parse_tool_calls(raw: &[WireToolCall]) -> ParsedToolCalls {
    let mut out = ParsedToolCalls::default();
    for call in raw {
        let id = call.id.clone();
        let name = call.name().map(str::to_string);
        let raw_args = call.arguments_text();
        let parsed = parse_tool_call(id.clone(), name.clone(), &raw_args).or_else(|bad| {
            let unwrapped = trim_special_tokens(&raw_args);
            if unwrapped.len() == raw_args.trim().len() {
                return Err(bad);
            }
            parse_tool_call(id, name, unwrapped).map_err(|_| bad)
        });
        match parsed {
            Ok(tc) => out.valid.push(tc),
            Err(bad) => out.invalid.push(bad),
        }
    }
    out
}
