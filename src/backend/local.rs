mod tool_object;
mod toolset;

pub use tool_object::ValidationError;
pub use toolset::{ToolCallError, ToolSet, ToolSetCreationError};

use super::{BackendError, CallToolResult, RemoteTool, ToolBackend};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Serves a [`ToolSet`] through the same surface as a remote server.
pub struct LocalToolBackend {
    toolset: ToolSet,
}

impl LocalToolBackend {
    pub fn new(toolset: ToolSet) -> Self {
        Self { toolset }
    }
}

#[async_trait]
impl ToolBackend for LocalToolBackend {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, BackendError> {
        Ok(self
            .toolset
            .descriptors()
            .into_iter()
            .map(|descriptor| RemoteTool {
                name: descriptor.name,
                description: Some(descriptor.description),
                input_schema: descriptor.input_schema,
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, BackendError> {
        debug!(tool = name, %arguments, "local tool call");
        match self.toolset.try_tool_call(name, arguments) {
            Ok(Ok(text)) => Ok(CallToolResult::text(text)),
            Ok(Err(err)) => Ok(CallToolResult::error(format!("{err:#}"))),
            Err(ToolCallError::NotFound(name)) => Err(BackendError::UnknownTool(name)),
            // mirrors an MCP server rejecting arguments that fail its input validation
            Err(err @ ToolCallError::Deserialization(_)) => {
                Ok(CallToolResult::error(err.to_string()))
            }
        }
    }
}
