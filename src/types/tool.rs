use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool that runs in-process. Argument fields live on the implementing
/// type and are filled by deserializing the model's call.
pub trait Tool {
    fn apply(&self) -> anyhow::Result<String>;
}

/// What the model is told about one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolDescriptor> for ChatCompletionTool {
    fn from(value: &ToolDescriptor) -> Self {
        Self {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: value.name.clone(),
                description: Some(value.description.clone()),
                parameters: Some(value.input_schema.clone()),
                strict: None,
            },
        }
    }
}
