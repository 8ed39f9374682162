// Step pipeline: ordered steps with critical/optional failure isolation
use super::WorkflowEngine;
use crate::domain::{
    JobRecord, StagingRecord, StagingStatus, StepCriticality, StepOutline, WorkflowRun,
    WorkflowSummary,
};
use crate::error::{AppError, Result};
use crate::port::{ArtifactError, RenderError, TimeProvider};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Step failure
#[derive(Error, Debug)]
pub enum StepError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage write failed; may succeed on a later attempt
    #[error("storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("downstream: {0}")]
    Downstream(String),

    /// An earlier step produced nothing for this step to work on
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl StepError {
    pub fn is_transient(&self) -> bool {
        match self {
            StepError::Storage(_) => true,
            StepError::App(AppError::Database(_)) => true,
            _ => false,
        }
    }
}

/// Mutable state threaded through the pipeline of one job
#[derive(Debug, Clone)]
pub struct StepContext {
    pub job: JobRecord,
    pub payload: Value,
    pub archive_location: Option<String>,
    pub staging: Option<StagingRecord>,
    pub staging_id: Option<i64>,
    pub duplicate: bool,
    pub downstream_status: Option<StagingStatus>,
    pub html: Option<String>,
    pub png: Option<Vec<u8>>,
    pub artifacts: Vec<String>,
}

impl StepContext {
    pub fn new(job: JobRecord, payload: Value) -> Self {
        Self {
            job,
            payload,
            archive_location: None,
            staging: None,
            staging_id: None,
            duplicate: false,
            downstream_status: None,
            html: None,
            png: None,
            artifacts: Vec::new(),
        }
    }
}

#[async_trait]
pub trait WorkflowStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn criticality(&self) -> StepCriticality;

    async fn execute(&self, ctx: &mut StepContext) -> std::result::Result<Value, StepError>;
}

/// Statically ordered SERP pipeline
pub struct SerpWorkflow {
    steps: Vec<Box<dyn WorkflowStep>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SerpWorkflow {
    pub fn new(steps: Vec<Box<dyn WorkflowStep>>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            steps,
            time_provider,
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order.
    ///
    /// A critical failure stops the pipeline and returns a failed run; an
    /// optional failure is recorded as a skip. `Err` is reserved for recorder
    /// misuse.
    pub async fn run(&self, ctx: &mut StepContext) -> Result<WorkflowRun> {
        let mut engine = WorkflowEngine::new(ctx.job.id.clone(), self.time_provider.clone());
        let mut last_result = None;

        for step in &self.steps {
            let name = step.name();
            engine.start_step(name, step.description())?;

            match step.execute(ctx).await {
                Ok(value) => {
                    engine.complete_step(name, value.clone())?;
                    last_result = Some(value);
                }
                Err(e) if step.criticality() == StepCriticality::Optional => {
                    warn!(job_id = %ctx.job.id, step = %name, error = %e, "Optional step skipped");
                    engine.skip_step(name, &e.to_string())?;
                }
                Err(e) => {
                    warn!(job_id = %ctx.job.id, step = %name, error = %e, "Critical step failed");
                    engine.fail_step(name, &e.to_string())?;
                    let mut run = engine.fail(format!("{} failed: {}", name, e));
                    run.retryable = e.is_transient();
                    return Ok(run);
                }
            }
        }

        let run = engine.complete(last_result);
        info!(
            job_id = %run.job_id,
            duration_ms = %run.total_duration_ms,
            skipped = ?run.skipped_steps(),
            "Workflow completed"
        );
        Ok(run)
    }
}

/// Condense a run and its context into the summary stored on the job record
pub fn summarize(run: &WorkflowRun, ctx: &StepContext) -> WorkflowSummary {
    let (paid_count, organic_count) = ctx
        .staging
        .as_ref()
        .map(|s| (s.content.paid.len(), s.content.organic.len()))
        .unwrap_or((0, 0));

    WorkflowSummary {
        success: run.success,
        total_duration_ms: run.total_duration_ms,
        staging_id: ctx.staging_id,
        duplicate: ctx.duplicate,
        paid_count,
        organic_count,
        artifacts: ctx.artifacts.clone(),
        steps: run
            .steps
            .iter()
            .map(|s| StepOutline {
                name: s.name.clone(),
                status: s.status,
                duration_ms: s.duration_ms,
            })
            .collect(),
        skipped: run.skipped_steps(),
    }
}
