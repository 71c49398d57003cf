pub mod chat;
pub mod completion;
pub mod dispatch;
pub mod embedding;
pub mod error;
pub mod json;
pub mod retry;
pub mod stream_collect;
pub mod tool_calls;
pub mod transport;

pub use crate::core::chat::{ChatModel, ChatStream};
pub use crate::core::completion::{CompletionModel, GenerationStream};
pub use crate::core::dispatch::RequestDispatcher;
pub use crate::core::embedding::EmbeddingModel;
pub use crate::core::error::{SdkError, TransportError};
pub use crate::core::stream_collect::{
    collect_chat_candidates, collect_chat_stream, concat_chat_candidates, concat_chat_chunks,
};
pub use crate::core::tool_calls::parse_tool_call;

#[cfg(test)]
#[path = "../tests/json_tests.rs"]
mod json_tests;

#[cfg(test)]
#[path = "../tests/retry_tests.rs"]
mod retry_tests;
