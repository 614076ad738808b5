use crate::backend::{BackendError, ToolBackend};
use crate::types::ToolDescriptor;

use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("tool listing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("tool listing timed out after {0:?}")]
    Timeout(Duration),
}

/// Turns a backend's tool listing into descriptors the model can read.
#[derive(Clone)]
pub struct ToolCatalog {
    backend: Arc<dyn ToolBackend>,
    timeout: Option<Duration>,
}

impl ToolCatalog {
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

    pub async fn fetch(&self) -> Result<Vec<ToolDescriptor>, CatalogError> {
        let listing = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.backend.list_tools())
                .await
                .map_err(|_| CatalogError::Timeout(limit))??,
            None => self.backend.list_tools().await?,
        };

        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(listing.len());
        for tool in listing {
            if !seen.insert(tool.name.clone()) {
                warn!(tool = %tool.name, "duplicate tool name in listing, keeping the first");
                continue;
            }
            tools.push(ToolDescriptor {
                name: tool.name,
                description: tool.description.unwrap_or_default(),
                input_schema: normalize_schema(tool.input_schema),
            });
        }
        debug!(count = tools.len(), "fetched tool catalog");
        Ok(tools)
    }
}

fn normalize_schema(schema: Value) -> Value {
    match schema {
        Value::Null => json!({"type": "object", "properties": {}}),
        schema => schema,
    }
}
