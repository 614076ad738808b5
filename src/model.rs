mod openai;

pub use openai::OpenAiModel;

use crate::types::{Message, ToolCallRequest, ToolDescriptor};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other,
}

/// The single choice a completion produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelReply {
    pub finish_reason: FinishReason,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            finish_reason: FinishReason::Stop,
            content: Some(content.into()),
            tool_calls: vec![],
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            finish_reason: FinishReason::ToolCalls,
            content: None,
            tool_calls,
        }
    }

    pub fn wants_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls && !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("bad request: {0}")]
    Request(String),
    #[error("completion endpoint failed: {0}")]
    Api(#[from] async_openai::error::OpenAIError),
    #[error("completion returned no choices")]
    NoChoices,
    #[error("no completion within {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelReply, CompletionError>;
}
