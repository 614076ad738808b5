use crate::backend::ToolBackend;
use crate::types::ToolCallResult;

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs single tool calls against a backend. Never fails: every problem is
/// folded into [`ToolCallResult::Failure`] for the model to read.
#[derive(Clone)]
pub struct ToolInvoker {
    backend: Arc<dyn ToolBackend>,
    timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self {
            backend,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolCallResult {
        info!(tool = name, %arguments, "calling tool");
        let call = self.backend.call_tool(name, arguments);
        let response = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(tool = name, ?limit, "tool call timed out");
                    return ToolCallResult::Failure(format!(
                        "tool `{name}` did not answer within {limit:?}"
                    ));
                }
            },
            None => call.await,
        };

        let result = match response {
            Ok(response) => match (response.first_text(), response.is_error) {
                (Some(text), false) => ToolCallResult::Success(text.to_string()),
                (Some(text), true) => {
                    ToolCallResult::Failure(format!("tool `{name}` failed: {text}"))
                }
                (None, false) => {
                    ToolCallResult::Failure(format!("tool `{name}` returned no text content"))
                }
                (None, true) => ToolCallResult::Failure(format!("tool `{name}` failed")),
            },
            Err(err) => {
                ToolCallResult::Failure(format!("tool `{name}` could not be called: {err}"))
            }
        };
        if let ToolCallResult::Failure(message) = &result {
            warn!(tool = name, %message, "tool call failed");
        }
        result
    }
}
