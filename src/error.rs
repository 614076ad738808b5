use crate::catalog::CatalogError;
use crate::model::CompletionError;

use thiserror::Error;

/// Failures that end a query. The session itself carries on.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("tool catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),
    #[error("completion request failed: {0}")]
    CompletionRequestFailed(#[from] CompletionError),
    #[error("model still requested tools after {limit} round trips")]
    CycleLimitExceeded {
        limit: usize,
        partial: Option<String>,
    },
}

/// Arguments the model produced that cannot be handed to a tool. Reported
/// back to the model as the tool's result.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("arguments for `{name}` are not valid JSON: {source}")]
    Decode {
        name: String,
        source: serde_json::Error,
    },
    #[error("arguments for `{name}` must be a JSON object, got {kind}")]
    NotAnObject { name: String, kind: &'static str },
}
