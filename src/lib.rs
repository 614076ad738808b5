pub mod backend;
pub mod builtin_tools;
pub mod catalog;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod types;

pub use backend::{LocalToolBackend, McpHttpBackend, ToolBackend};
pub use client::cli::InteractiveShell;
pub use conversation::{ConversationState, HistoryMode};
pub use error::QueryError;
pub use model::{CompletionModel, OpenAiModel};
pub use orchestrator::{LoopConfig, OrchestrationLoop, QueryOutcome};
pub use types::{Message, ToolCallRequest, ToolCallResult, ToolDescriptor};
