// Application Layer - Use Cases and Business Logic

pub mod lifecycle;
pub mod processor;
pub mod recovery;
pub mod retry;
pub mod staging;
pub mod submit;
pub mod workflow;

// Re-exports
pub use lifecycle::{JobLifecycleManager, MoveOutcome, QueueStatistics};
pub use processor::{
    shutdown_channel, CycleReport, PollingProcessor, ProcessorConfig, RunReport, ShutdownSender,
    ShutdownToken,
};
pub use recovery::{QueueRecovery, RecoveryReport};
pub use retry::RetryPolicy;
pub use staging::{InsertOutcome, StagingDeduplicator};
pub use submit::{JobSubmitter, SearchDefaults};
pub use workflow::{SerpWorkflow, WorkflowDeps, WorkflowEngine};
