// Workflow step engine: append-only step recorder for one job

pub mod pipeline;
pub mod steps;

pub use pipeline::{summarize, SerpWorkflow, StepContext, StepError, WorkflowStep};
pub use steps::WorkflowDeps;

use crate::domain::{DomainError, StepResult, StepStatus, WorkflowRun};
use crate::port::TimeProvider;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

type StepOutcome = std::result::Result<(), DomainError>;

/// Records step transitions for a single workflow run.
///
/// A step is started once and then closed exactly once (completed, failed or
/// skipped). Closing a step that is not running is rejected.
pub struct WorkflowEngine {
    job_id: String,
    time_provider: Arc<dyn TimeProvider>,
    started_at: DateTime<Utc>,
    steps: Vec<StepResult>,
}

impl WorkflowEngine {
    pub fn new(job_id: impl Into<String>, time_provider: Arc<dyn TimeProvider>) -> Self {
        let started_at = time_provider.now();
        Self {
            job_id: job_id.into(),
            time_provider,
            started_at,
            steps: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn start_step(&mut self, name: &str, description: &str) -> StepOutcome {
        if let Some(step) = self.running(name) {
            return Err(DomainError::StepNotRunning {
                step: step.name.clone(),
                status: "already running".to_string(),
            });
        }

        debug!(job_id = %self.job_id, step = %name, "Step started");
        self.steps.push(StepResult {
            name: name.to_string(),
            description: description.to_string(),
            status: StepStatus::Running,
            started_at: self.time_provider.now(),
            ended_at: None,
            duration_ms: None,
            result: None,
            error: None,
        });
        Ok(())
    }

    pub fn complete_step(&mut self, name: &str, result: Value) -> StepOutcome {
        self.close(name, StepStatus::Completed, Some(result), None)
    }

    pub fn fail_step(&mut self, name: &str, error: &str) -> StepOutcome {
        self.close(name, StepStatus::Failed, None, Some(error.to_string()))
    }

    /// Record an optional step's failure as a skip; the run carries on
    pub fn skip_step(&mut self, name: &str, reason: &str) -> StepOutcome {
        self.close(
            name,
            StepStatus::Failed,
            Some(json!({ "skipped": true, "reason": reason })),
            Some(reason.to_string()),
        )
    }

    pub fn complete(self, final_result: Option<Value>) -> WorkflowRun {
        self.finish(true, final_result, None)
    }

    /// Close the run as failed, failing any step still running
    pub fn fail(mut self, error: impl Into<String>) -> WorkflowRun {
        let error = error.into();
        let now = self.time_provider.now();
        for step in self
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::Running)
        {
            step.status = StepStatus::Failed;
            step.ended_at = Some(now);
            step.duration_ms = Some((now - step.started_at).num_milliseconds());
            step.error = Some(error.clone());
        }
        self.finish(false, None, Some(error))
    }

    fn finish(self, success: bool, result: Option<Value>, error: Option<String>) -> WorkflowRun {
        let total_duration_ms = (self.time_provider.now() - self.started_at).num_milliseconds();
        WorkflowRun {
            job_id: self.job_id,
            steps: self.steps,
            success,
            total_duration_ms,
            result,
            error,
            retryable: false,
        }
    }

    fn running(&self, name: &str) -> Option<&StepResult> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.name == name && s.status == StepStatus::Running)
    }

    fn close(
        &mut self,
        name: &str,
        status: StepStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> StepOutcome {
        let now = self.time_provider.now();
        let step = match self.steps.iter_mut().rev().find(|s| s.name == name) {
            Some(step) if step.status == StepStatus::Running => step,
            Some(step) => {
                return Err(DomainError::StepNotRunning {
                    step: name.to_string(),
                    status: step.status.to_string(),
                })
            }
            None => {
                return Err(DomainError::StepNotRunning {
                    step: name.to_string(),
                    status: "not started".to_string(),
                })
            }
        };

        step.status = status;
        step.ended_at = Some(now);
        step.duration_ms = Some((now - step.started_at).num_milliseconds());
        step.result = result;
        step.error = error;
        debug!(job_id = %self.job_id, step = %name, status = %status, "Step closed");
        Ok(())
    }
}
