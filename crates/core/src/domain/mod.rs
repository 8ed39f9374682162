// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;
pub mod staging;
pub mod workflow;

// Re-exports
pub use error::DomainError;
pub use job::{
    CompletionMetadata, FailureInfo, FailureKind, JobId, JobPatch, JobRecord, JobStatus,
};
pub use queue::{Queue, QueueName};
pub use staging::{
    OrganicListing, PaidListing, RequestParams, SerpContent, StagingRecord, StagingStatus,
    StoredStagingRecord,
};
pub use workflow::{
    StepCriticality, StepOutline, StepResult, StepStatus, WorkflowRun, WorkflowSummary,
};
