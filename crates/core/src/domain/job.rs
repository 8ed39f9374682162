// Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::workflow::WorkflowSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job ID (provider-assigned or locally generated)
pub type JobId = String;

/// Job Status. Each status owns exactly one queue document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// All statuses in lifecycle order
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Submitted,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Name of the queue document holding jobs in this status
    pub fn queue_name(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Position in the lifecycle; completed and failed share the terminal rank
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Submitted => 0,
            JobStatus::InProgress => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Transitions only move forward. Completion requires passing through in_progress;
    /// failure may happen straight from submitted (malformed records).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Submitted, JobStatus::InProgress) => true,
            (JobStatus::Submitted, JobStatus::Failed) => true,
            (JobStatus::InProgress, JobStatus::Completed) => true,
            (JobStatus::InProgress, JobStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// Why a job ended up in the failed queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Provider,
    Workflow,
    Validation,
}

/// Metadata recorded when a job completes
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionMetadata {
    pub processing_time_ms: i64,
    pub summary: Option<WorkflowSummary>,
}

/// Error information recorded when a job fails
#[derive(Debug, Clone, PartialEq)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureInfo {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Job Record - local tracking entity for one submitted scraping task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub query: String,
    pub location: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    /// Workflow summary, set on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkflowSummary>,
}

impl JobRecord {
    /// Create a new record in the submitted state
    ///
    /// # Arguments
    ///
    /// * `id` - Provider job ID (or a locally generated one)
    /// * `query` - Search query
    /// * `location` - Geo location the search is run from
    /// * `submitted_at` - Submission time (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        query: impl Into<String>,
        location: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            location: location.into(),
            status: JobStatus::Submitted,
            submitted_at,
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            error: None,
            error_kind: None,
            result: None,
        }
    }

    /// Reject records that could never be processed
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::ValidationError("job id is empty".to_string()));
        }
        if self.query.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "job {} has an empty query",
                self.id
            )));
        }
        if self.location.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "job {} has an empty location",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_transition(&self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }

    /// Transition to in_progress with explicit timestamp
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_transition(JobStatus::InProgress)?;
        self.status = JobStatus::InProgress;
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition to completed with explicit timestamp
    pub fn complete(&mut self, now: DateTime<Utc>, metadata: CompletionMetadata) -> Result<()> {
        self.ensure_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.processing_time_ms = Some(metadata.processing_time_ms);
        self.result = metadata.summary;
        self.error = None;
        self.error_kind = None;
        Ok(())
    }

    /// Transition to failed with explicit timestamp
    pub fn fail(&mut self, now: DateTime<Utc>, failure: FailureInfo) -> Result<()> {
        self.ensure_transition(JobStatus::Failed)?;
        if let Some(started_at) = self.started_at {
            self.processing_time_ms = Some((now - started_at).num_milliseconds().max(0));
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(now);
        self.error = Some(failure.message);
        self.error_kind = Some(failure.kind);
        Ok(())
    }

    /// Milliseconds spent in_progress, or None when the record was never started
    pub fn in_progress_age_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at
            .map(|started_at| (now - started_at).num_milliseconds())
    }
}

/// Change applied to a record while it moves between queues
#[derive(Debug, Clone, PartialEq)]
pub enum JobPatch {
    Start { started_at: DateTime<Utc> },
    Complete {
        completed_at: DateTime<Utc>,
        metadata: CompletionMetadata,
    },
    Fail {
        failed_at: DateTime<Utc>,
        failure: FailureInfo,
    },
}

impl JobPatch {
    /// Status the record carries after the patch
    pub fn target_status(&self) -> JobStatus {
        match self {
            JobPatch::Start { .. } => JobStatus::InProgress,
            JobPatch::Complete { .. } => JobStatus::Completed,
            JobPatch::Fail { .. } => JobStatus::Failed,
        }
    }

    pub fn apply(&self, record: &mut JobRecord) -> Result<()> {
        match self {
            JobPatch::Start { started_at } => record.start(*started_at),
            JobPatch::Complete {
                completed_at,
                metadata,
            } => record.complete(*completed_at, metadata.clone()),
            JobPatch::Fail { failed_at, failure } => record.fail(*failed_at, failure.clone()),
        }
    }
}
