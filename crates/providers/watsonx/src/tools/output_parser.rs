use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::ai_sdk_core::SdkError;
use crate::ai_sdk_types::json::parse_partial_json;
use crate::ai_sdk_types::{ChatGeneration, ChatGenerationChunk};

/// One tool call with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTool<T> {
    pub name: String,
    /// Set only when the parser was built with `return_id`.
    pub id: Option<String>,
    pub args: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolsOutput<T> {
    Many(Vec<ParsedTool<T>>),
    Single(Option<ParsedTool<T>>),
}

impl<T> ToolsOutput<T> {
    pub fn into_vec(self) -> Vec<ParsedTool<T>> {
        match self {
            ToolsOutput::Many(v) => v,
            ToolsOutput::Single(t) => t.into_iter().collect(),
        }
    }
}

/// Extracts typed tool-call arguments from a model reply.
///
/// `key_name` restricts the output to calls of one tool; `return_single`
/// keeps only the first match.
#[derive(Debug)]
pub struct ToolsOutputParser<T> {
    pub key_name: Option<String>,
    pub return_single: bool,
    pub return_id: bool,
    latest_correct: Option<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for ToolsOutputParser<T> {
    fn default() -> Self {
        Self {
            key_name: None,
            return_single: false,
            return_id: false,
            latest_correct: None,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned + Clone> ToolsOutputParser<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn with_return_single(mut self, return_single: bool) -> Self {
        self.return_single = return_single;
        self
    }

    pub fn with_return_id(mut self, return_id: bool) -> Self {
        self.return_id = return_id;
        self
    }

    fn wanted(&self, name: Option<&str>) -> bool {
        match (&self.key_name, name) {
            (None, _) => true,
            (Some(key), Some(name)) => key == name,
            (Some(_), None) => false,
        }
    }

    /// Strict parse of a finished generation.
    ///
    /// A matching call whose arguments were not valid JSON, or do not
    /// deserialize into `T`, is an [`SdkError::OutputParse`].
    pub fn parse(&self, generation: &ChatGeneration) -> Result<ToolsOutput<T>, SdkError> {
        let message = &generation.message;
        if let Some(bad) = message
            .invalid_tool_calls
            .iter()
            .find(|c| self.wanted(c.name.as_deref()))
        {
            return Err(SdkError::OutputParse {
                text: bad.args.clone().unwrap_or_default(),
                message: bad.error.clone().unwrap_or_else(|| "invalid tool call".into()),
            });
        }
        let mut tools = Vec::new();
        for call in message.tool_calls.iter().filter(|c| self.wanted(Some(&c.name))) {
            tools.push(ParsedTool {
                name: call.name.clone(),
                id: if self.return_id { call.id.clone() } else { None },
                args: deserialize_args(&call.args)?,
            });
            if self.return_single {
                break;
            }
        }
        Ok(if self.return_single {
            ToolsOutput::Single(tools.into_iter().next())
        } else {
            ToolsOutput::Many(tools)
        })
    }

    /// Lenient parse of the chunks received so far.
    ///
    /// Incomplete argument text is closed before decoding. When the newest
    /// text cannot be decoded into `T` the last value that could is returned.
    pub fn parse_partial(&mut self, chunks: &[ChatGenerationChunk]) -> Option<T> {
        let mut merged: BTreeMap<usize, (Option<String>, String)> = BTreeMap::new();
        for chunk in chunks {
            for (pos, tc) in chunk.message.tool_call_chunks.iter().enumerate() {
                let entry = merged.entry(tc.index.unwrap_or(pos)).or_default();
                if entry.0.is_none() {
                    entry.0 = tc.name.clone().filter(|n| !n.is_empty());
                }
                if let Some(args) = &tc.args {
                    entry.1.push_str(args);
                }
            }
        }
        let current = merged
            .into_values()
            .find(|(name, _)| self.wanted(name.as_deref()))
            .and_then(|(_, args)| parse_partial_json(&args))
            .and_then(|v| serde_json::from_value::<T>(v).ok());
        if let Some(v) = current {
            self.latest_correct = Some(v);
        }
        self.latest_correct.clone()
    }
}

fn deserialize_args<T: DeserializeOwned>(args: &JsonValue) -> Result<T, SdkError> {
    serde_json::from_value(args.clone()).map_err(|e| {
        let text = args.to_string();
        SdkError::OutputParse {
            message: format!("Failed to parse. Text: \"{text}\". Error: {e}"),
            text,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_sdk_types::{
        ChatMessage, ChatMessageChunk, GenerationInfo, InvalidToolCall, Role, ToolCall,
        ToolCallChunk,
    };
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Weather {
        location: String,
        #[serde(default)]
        unit: Option<String>,
    }

    fn generation(calls: Vec<ToolCall>) -> ChatGeneration {
        ChatGeneration {
            text: String::new(),
            message: ChatMessage::assistant_tool_calls(calls),
            finish_reason: Some("tool_calls".into()),
        }
    }

    fn call(id: &str, name: &str, args: JsonValue) -> ToolCall {
        ToolCall {
            id: Some(id.into()),
            name: name.into(),
            args,
        }
    }

    #[test]
    fn filters_by_key_and_returns_single_with_id() {
        let generation = generation(vec![
            call("a", "other", json!({})),
            call("b", "weather", json!({"location": "Paris"})),
        ]);
        let parser = ToolsOutputParser::<Weather>::new()
            .with_key_name("weather")
            .with_return_single(true)
            .with_return_id(true);
        match parser.parse(&generation).unwrap() {
            ToolsOutput::Single(Some(t)) => {
                assert_eq!(t.id.as_deref(), Some("b"));
                assert_eq!(t.args.location, "Paris");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn schema_mismatch_is_output_parse_error() {
        let generation = generation(vec![call("a", "weather", json!({"city": "Paris"}))]);
        let err = ToolsOutputParser::<Weather>::new()
            .parse(&generation)
            .unwrap_err();
        match err {
            SdkError::OutputParse { text, message } => {
                assert!(text.contains("Paris"));
                assert!(message.contains("location"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_tool_call_surfaces_as_output_parse_error() {
        let mut generation = generation(vec![]);
        generation.message.invalid_tool_calls.push(InvalidToolCall {
            id: Some("x".into()),
            name: Some("weather".into()),
            args: Some("{bad".into()),
            error: Some("not valid JSON".into()),
        });
        assert!(matches!(
            ToolsOutputParser::<Weather>::new().parse(&generation),
            Err(SdkError::OutputParse { .. })
        ));
    }

    fn arg_chunk(args: &str, name: Option<&str>) -> ChatGenerationChunk {
        let mut message = ChatMessageChunk::new(Role::Assistant, "");
        message.tool_call_chunks.push(ToolCallChunk {
            id: None,
            name: name.map(str::to_string),
            args: Some(args.into()),
            index: Some(0),
        });
        ChatGenerationChunk {
            text: String::new(),
            message,
            generation_info: GenerationInfo::default(),
        }
    }

    #[test]
    fn partial_parse_keeps_latest_correct_value() {
        let mut parser = ToolsOutputParser::<Weather>::new();
        let mut chunks = vec![arg_chunk("{\"loc", Some("weather"))];
        assert_eq!(parser.parse_partial(&chunks), None);
        chunks.push(arg_chunk("ation\": \"Par", None));
        assert_eq!(
            parser.parse_partial(&chunks),
            Some(Weather {
                location: "Par".into(),
                unit: None
            })
        );
        chunks.push(arg_chunk("is\", \"unit", None));
        let latest = parser.parse_partial(&chunks).unwrap();
        assert_eq!(latest.location, "Paris");
    }
}
