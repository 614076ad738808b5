use super::tool_object::{ToolObject, ValidationError};
use crate::types::{Tool, ToolDescriptor};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::hash_map::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolSetCreationError {
    #[error("error validating schema")]
    Validation(ValidationError),
    #[error("two or more tools have the same name: {0}")]
    NameConflict(String),
}

#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("error deserializing tool call (possible hallucination): {0}")]
    Deserialization(serde_json::Error),
    #[error("tool not in toolset: {0}")]
    NotFound(String),
}

/// Typed in-process tools keyed by name, listed in registration order.
#[derive(Default)]
pub struct ToolSet {
    order: Vec<String>,
    tools: HashMap<String, ToolObject>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            order: vec![],
            tools: HashMap::new(),
        }
    }

    pub fn add_tool<T>(mut self) -> Result<Self, ToolSetCreationError>
    where
        T: JsonSchema + Tool + DeserializeOwned + Send + Sync + 'static,
    {
        let tool_object =
            ToolObject::try_from_tool::<T>().map_err(ToolSetCreationError::Validation)?;
        if self.tools.contains_key(&tool_object.name) {
            Err(ToolSetCreationError::NameConflict(tool_object.name.clone()))
        } else {
            self.order.push(tool_object.name.clone());
            self.tools.insert(tool_object.name.clone(), tool_object);
            Ok(self)
        }
    }

    /// Outer error: the call never reached a tool. Inner error: the tool ran
    /// and failed.
    pub fn try_tool_call(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<anyhow::Result<String>, ToolCallError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolCallError::NotFound(tool_name.to_owned()))
            .and_then(|tool| {
                tool.try_deserialize(arguments)
                    .map_err(ToolCallError::Deserialization)
            })?;
        Ok(tool.apply())
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(ToolObject::descriptor)
            .collect()
    }
}
