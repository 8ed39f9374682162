// Domain rule violations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Queue moves must follow submitted -> in_progress -> completed | failed
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Workflow step '{step}' is {status}, expected running")]
    StepNotRunning { step: String, status: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
