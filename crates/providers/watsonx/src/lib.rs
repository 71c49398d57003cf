//! IBM watsonx.ai provider: chat, text generation, embeddings and tools.

pub mod api_types;
pub mod auth;
pub mod config;
pub mod error;
pub mod params;
pub mod service;
mod stream;
pub mod chat {
    pub mod convert;
    pub mod language_model;
    pub mod stream;
}
pub mod completion {
    pub mod language_model;
    pub mod stream;
}
pub mod embedding {
    pub mod embedding_model;
}
pub mod tools {
    pub mod convert;
    pub mod output_parser;
    pub mod tool_call_id;
    pub mod toolkit;
}

pub use auth::{select_authenticator, AuthKind, Authenticator, WatsonxAuth};
pub use chat::language_model::{ChatCallOptions, ChatWatsonx};
pub use completion::language_model::{LlmCallOptions, WatsonxLlm};
pub use config::{Scope, WatsonxConfig};
pub use embedding::embedding_model::WatsonxEmbeddings;
pub use params::{ChatParams, EmbeddingParameters, TextGenParameters};
pub use service::WatsonxService;
pub use tools::convert::{
    parse_tool_calls, ParsedToolCalls, StructuredTool, ToolDefinition, WatsonxTool,
};
pub use tools::output_parser::{ParsedTool, ToolsOutput, ToolsOutputParser};
pub use tools::tool_call_id::to_provider_tool_call_id;
pub use tools::toolkit::{WatsonxToolkit, WatsonxUtilityTool};

#[cfg(test)]
#[path = "../tests/support.rs"]
mod support;

#[cfg(test)]
#[path = "../tests/auth_tests.rs"]
mod auth_tests;

#[cfg(test)]
#[path = "../tests/chat_language_model_tests.rs"]
mod chat_language_model_tests;

#[cfg(test)]
#[path = "../tests/chat_stream_tests.rs"]
mod chat_stream_tests;

#[cfg(test)]
#[path = "../tests/completion_tests.rs"]
mod completion_tests;

#[cfg(test)]
#[path = "../tests/embedding_model_tests.rs"]
mod embedding_model_tests;

#[cfg(test)]
#[path = "../tests/toolkit_tests.rs"]
mod toolkit_tests;
