// Workflow Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Step status. Only `Running` steps may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Whether a step's failure aborts the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCriticality {
    Critical,
    Optional,
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl StepResult {
    /// True when an optional step failed and was recorded as skipped
    pub fn is_skipped(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.get("skipped"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Outcome of one job's pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub job_id: String,
    pub steps: Vec<StepResult>,
    pub success: bool,
    pub total_duration_ms: i64,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    /// A critical step failed for a reason that may clear up on a later cycle
    pub retryable: bool,
}

impl WorkflowRun {
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn skipped_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.is_skipped())
            .map(|s| s.name.clone())
            .collect()
    }
}

/// Condensed step entry kept on the job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutline {
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Workflow summary stored as a completed job's result metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSummary {
    pub success: bool,
    pub total_duration_ms: i64,
    pub staging_id: Option<i64>,
    pub duplicate: bool,
    pub paid_count: usize,
    pub organic_count: usize,
    pub artifacts: Vec<String>,
    pub steps: Vec<StepOutline>,
    pub skipped: Vec<String>,
}
