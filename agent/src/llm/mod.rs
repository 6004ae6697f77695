//! LLM abstraction layer
//!
//! Workers and the planner talk to the model through the [`Llm`] trait, so
//! the orchestration logic can run against Ollama in production and a
//! scripted model in tests.

mod ollama;
pub mod parsers;
mod types;

pub use ollama::{list_models, ModelInfo, OllamaClient};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ToolCall, ToolCallFunction, ToolFunctionSpec,
    ToolSpec,
};

use anyhow::Result;
use async_trait::async_trait;

/// Trait for LLM backends
#[async_trait]
pub trait Llm: Send + Sync {
    /// Send one chat request (history, tools, sampling options) and return
    /// the assistant reply
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Default model name
    fn model(&self) -> &str;
}
