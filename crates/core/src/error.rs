// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Local queue store is unreadable or unwritable. Fatal for the processor.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Staging datastore failure (connection, query, decode)
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::port::ProviderError),

    #[error("Job {job_id} exceeded maximum in-progress age ({age_ms}ms)")]
    TimeoutExceeded { job_id: String, age_ms: i64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that must stop the processor instead of being absorbed by a cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_only_persistence_is_fatal() {
        assert!(AppError::Persistence("disk full".into()).is_fatal());
        assert!(!AppError::Database("locked".into()).is_fatal());
        assert!(!AppError::Validation("bad".into()).is_fatal());
        assert!(!AppError::Domain(DomainError::ValidationError("j1".into())).is_fatal());
        assert!(!AppError::TimeoutExceeded {
            job_id: "j1".into(),
            age_ms: 10
        }
        .is_fatal());
    }
}
