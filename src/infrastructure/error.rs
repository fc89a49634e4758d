use crate::domain::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl InfraError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{kind} not found: {id}"))
    }
}

impl From<SyncError> for InfraError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::TaskNotFound(id) => Self::not_found("task", &id),
            SyncError::BlockNotFound(id) => Self::not_found("block", &id),
            SyncError::TodoNotFound(id) => Self::not_found("todo", &id),
            other @ SyncError::TodoAlreadyDone(_) => Self::Validation(other.to_string()),
        }
    }
}
