//! The tool-serving side of the client: anything that can list tools and run
//! one of them by name.

mod local;
mod mcp_http;

pub use local::{LocalToolBackend, ToolSet, ToolSetCreationError, ValidationError};
pub use mcp_http::McpHttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tool metadata as a backend reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: true,
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            ContentItem::Other => None,
        })
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
}

impl BackendError {
    /// The connection is gone or the server no longer knows the session.
    /// Protocol level errors leave the session usable.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            BackendError::Transport(_) | BackendError::Status { status: 404, .. }
        )
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, BackendError>;

    async fn call_tool(&self, name: &str, arguments: Value)
    -> Result<CallToolResult, BackendError>;

    /// Releases whatever connection the backend holds.
    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_listing_without_description() {
        let tool: RemoteTool = serde_json::from_value(json!({
            "name": "get_today",
            "inputSchema": {"type": "object", "properties": {}}
        }))
        .unwrap();
        assert_eq!(tool.description, None);
        assert_eq!(tool.input_schema["type"], "object");
    }

    #[test]
    fn first_text_skips_non_text_items() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "22.857142857142858"}
            ],
            "isError": false
        }))
        .unwrap();
        assert_eq!(result.first_text(), Some("22.857142857142858"));
    }

    #[test]
    fn only_lost_connections_end_a_session() {
        let expired = BackendError::Status {
            status: 404,
            body: "session not found".into(),
        };
        let busy = BackendError::Status {
            status: 503,
            body: "try later".into(),
        };
        let rpc = BackendError::Rpc {
            code: -32602,
            message: "Unknown tool: nope".into(),
        };
        assert!(expired.is_connection_lost());
        assert!(!busy.is_connection_lost());
        assert!(!rpc.is_connection_lost());
        assert!(!BackendError::Malformed("eof".into()).is_connection_lost());
    }
}
