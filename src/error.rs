use thiserror::Error;

/// Errors returned by the tree traversal APIs.
///
/// "Not found" is never an error: operations report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("query error: {0}")]
    Query(#[from] sea_orm::DbErr),

    #[error("invalid tree configuration: {0}")]
    Config(String),

    #[error("tree configuration could not be parsed: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

impl TreeError {
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config(detail.into())
    }
}
