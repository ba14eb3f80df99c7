use thiserror::Error;

/// Top-level error type for TaskFast.
///
/// Storage, validation and configuration failures from every crate funnel
/// through this type so that `?` works across crate boundaries. Request
/// boundaries translate it into their own failure shapes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskfastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller supplied a value that breaks a domain rule.
    ///
    /// The message is shown to end users verbatim, so it carries no prefix.
    #[error("{0}")]
    Validation(String),

    /// The record does not exist or belongs to another owner.
    #[error("{0} not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TaskfastError {
    /// Shorthand for the generic "Task not found" failure.
    pub fn task_not_found() -> Self {
        TaskfastError::NotFound("Task".to_string())
    }
}

impl From<toml::de::Error> for TaskfastError {
    fn from(err: toml::de::Error) -> Self {
        TaskfastError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TaskfastError {
    fn from(err: toml::ser::Error) -> Self {
        TaskfastError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TaskfastError {
    fn from(err: serde_json::Error) -> Self {
        TaskfastError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for TaskFast operations.
pub type Result<T> = std::result::Result<T, TaskfastError>;
