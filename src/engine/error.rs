use thiserror::Error;
use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("conflicts with active windows: {}", fmt_ids(.0))]
    Conflict(Vec<Ulid>),
    #[error("resource {0} is busy, retry")]
    Concurrency(Ulid),
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Transient failures the caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Concurrency(_) | EngineError::Storage(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Storage(other.to_string()),
        }
    }
}

fn fmt_ids(ids: &[Ulid]) -> String {
    ids.iter()
        .map(Ulid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
