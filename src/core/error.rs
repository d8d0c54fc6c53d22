use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("Missing attribute '{0}': column was not loaded")]
    MissingAttribute(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Validation failed: {0}")]
    RecordInvalid(String),

    #[error("Record {0} not found")]
    RecordNotFound(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl<T> From<std::sync::PoisonError<T>> for ModelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
