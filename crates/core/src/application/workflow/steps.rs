// Standard SERP pipeline steps
use super::pipeline::{SerpWorkflow, StepContext, StepError, WorkflowStep};
use crate::application::retry::{self, Attempt, RetryOutcome, RetryPolicy, Retryable};
use crate::application::staging::{map_to_normalized_form, InsertOutcome, StagingDeduplicator};
use crate::domain::{RequestParams, StagingStatus, StepCriticality};
use crate::error::AppError;
use crate::port::{ArtifactStore, ResultArchive, ResultRenderer, TimeProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

type StepResult = std::result::Result<Value, StepError>;

/// Collaborators of the standard pipeline
pub struct WorkflowDeps {
    pub archive: Arc<dyn ResultArchive>,
    pub deduplicator: Arc<StagingDeduplicator>,
    pub renderer: Arc<dyn ResultRenderer>,
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Bounded wait for the staging row to leave `pending`
    pub downstream_policy: RetryPolicy,
}

impl SerpWorkflow {
    /// validate → collect → process → waitForDownstream → renderHtml →
    /// renderPng → uploadStorage → finalize
    pub fn standard(deps: WorkflowDeps, time_provider: Arc<dyn TimeProvider>) -> Self {
        let steps: Vec<Box<dyn WorkflowStep>> = vec![
            Box::new(ValidateStep),
            Box::new(CollectStep {
                archive: deps.archive,
            }),
            Box::new(ProcessStep {
                deduplicator: deps.deduplicator.clone(),
            }),
            Box::new(WaitForDownstreamStep {
                deduplicator: deps.deduplicator,
                policy: deps.downstream_policy,
            }),
            Box::new(RenderHtmlStep {
                renderer: deps.renderer.clone(),
            }),
            Box::new(RenderPngStep {
                renderer: deps.renderer,
            }),
            Box::new(UploadStorageStep {
                artifacts: deps.artifacts,
            }),
            Box::new(FinalizeStep),
        ];
        SerpWorkflow::new(steps, time_provider)
    }
}

impl Retryable for AppError {
    fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_))
    }
}

struct ValidateStep;

#[async_trait]
impl WorkflowStep for ValidateStep {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn description(&self) -> &'static str {
        "Check job record and payload shape"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Critical
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        ctx.job
            .validate()
            .map_err(|e| StepError::Validation(e.to_string()))?;

        let results = ctx
            .payload
            .get("results")
            .and_then(Value::as_array)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| StepError::Validation("payload has no results".to_string()))?;

        if !results[0].get("content").is_some_and(Value::is_object) {
            return Err(StepError::Validation(
                "first result has no content object".to_string(),
            ));
        }

        Ok(json!({ "results": results.len() }))
    }
}

struct CollectStep {
    archive: Arc<dyn ResultArchive>,
}

#[async_trait]
impl WorkflowStep for CollectStep {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn description(&self) -> &'static str {
        "Archive the raw provider payload"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Critical
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        let location = self
            .archive
            .save_raw(&ctx.job.id, &ctx.payload)
            .await
            .map_err(|e| StepError::Storage(e.to_string()))?;
        ctx.archive_location = Some(location.clone());
        Ok(json!({ "location": location }))
    }
}

struct ProcessStep {
    deduplicator: Arc<StagingDeduplicator>,
}

#[async_trait]
impl WorkflowStep for ProcessStep {
    fn name(&self) -> &'static str {
        "process"
    }

    fn description(&self) -> &'static str {
        "Normalize results and insert the staging record"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Critical
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        let params = RequestParams {
            job_id: ctx.job.id.clone(),
            query: ctx.job.query.clone(),
            location: ctx.job.location.clone(),
            timestamp: ctx.job.started_at.unwrap_or(ctx.job.submitted_at),
        };

        let record = map_to_normalized_form(&ctx.payload, &params).map_err(|e| match e {
            AppError::Validation(reason) => StepError::Validation(reason),
            other => StepError::App(other),
        })?;

        match self.deduplicator.insert(&record).await? {
            InsertOutcome::Inserted { id } => {
                ctx.staging_id = Some(id);
                ctx.staging = Some(record);
            }
            InsertOutcome::Duplicate { existing } => {
                ctx.staging_id = Some(existing.id);
                ctx.duplicate = true;
                ctx.staging = Some(existing.record);
            }
            InsertOutcome::Rejected { reason } => return Err(StepError::Validation(reason)),
        }

        Ok(json!({
            "stagingId": ctx.staging_id,
            "duplicate": ctx.duplicate,
        }))
    }
}

struct WaitForDownstreamStep {
    deduplicator: Arc<StagingDeduplicator>,
    policy: RetryPolicy,
}

#[async_trait]
impl WorkflowStep for WaitForDownstreamStep {
    fn name(&self) -> &'static str {
        "waitForDownstream"
    }

    fn description(&self) -> &'static str {
        "Wait for downstream processing of the staging record"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Optional
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        if ctx.staging_id.is_none() {
            return Err(StepError::MissingInput("no staging record".to_string()));
        }

        let job_id = ctx.job.id.clone();
        let outcome = retry::execute(&self.policy, "downstream", |_| {
            let deduplicator = self.deduplicator.clone();
            let job_id = job_id.clone();
            async move {
                let attempt = match deduplicator.downstream_status(&job_id).await? {
                    Some(StagingStatus::Pending) => Attempt::NotReady("pending".to_string()),
                    Some(status) => Attempt::Ready(status),
                    None => Attempt::NotReady("staging row not visible".to_string()),
                };
                Ok::<_, AppError>(attempt)
            }
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                ctx.downstream_status = Some(value);
                if value == StagingStatus::Error {
                    return Err(StepError::Downstream(
                        "downstream processing reported an error".to_string(),
                    ));
                }
                Ok(json!({ "status": value.as_str(), "attempts": attempts }))
            }
            RetryOutcome::Exhausted {
                attempts,
                last_reason,
            } => {
                ctx.downstream_status = Some(StagingStatus::Pending);
                Err(StepError::Downstream(format!(
                    "not confirmed after {} attempts ({})",
                    attempts, last_reason
                )))
            }
            RetryOutcome::Terminal { error, .. } => Err(StepError::App(error)),
            RetryOutcome::Interrupted { attempts } => Err(StepError::Downstream(format!(
                "wait interrupted after {} attempts",
                attempts
            ))),
        }
    }
}

struct RenderHtmlStep {
    renderer: Arc<dyn ResultRenderer>,
}

#[async_trait]
impl WorkflowStep for RenderHtmlStep {
    fn name(&self) -> &'static str {
        "renderHtml"
    }

    fn description(&self) -> &'static str {
        "Render an HTML report"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Optional
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        let staging = ctx
            .staging
            .as_ref()
            .ok_or_else(|| StepError::MissingInput("no staging record".to_string()))?;
        let html = self.renderer.render_html(staging).await?;
        let bytes = html.len();
        ctx.html = Some(html);
        Ok(json!({ "bytes": bytes }))
    }
}

struct RenderPngStep {
    renderer: Arc<dyn ResultRenderer>,
}

#[async_trait]
impl WorkflowStep for RenderPngStep {
    fn name(&self) -> &'static str {
        "renderPng"
    }

    fn description(&self) -> &'static str {
        "Render a PNG snapshot of the report"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Optional
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        let html = ctx
            .html
            .as_deref()
            .ok_or_else(|| StepError::MissingInput("no html report".to_string()))?;
        let png = self.renderer.render_png(html).await?;
        let bytes = png.len();
        ctx.png = Some(png);
        Ok(json!({ "bytes": bytes }))
    }
}

struct UploadStorageStep {
    artifacts: Arc<dyn ArtifactStore>,
}

#[async_trait]
impl WorkflowStep for UploadStorageStep {
    fn name(&self) -> &'static str {
        "uploadStorage"
    }

    fn description(&self) -> &'static str {
        "Upload rendered artifacts"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Optional
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        if ctx.html.is_none() && ctx.png.is_none() {
            return Err(StepError::MissingInput("nothing rendered".to_string()));
        }

        let mut uploaded = Vec::new();
        if let Some(html) = &ctx.html {
            let key = format!("reports/{}.html", ctx.job.id);
            uploaded.push(
                self.artifacts
                    .put(&key, html.clone().into_bytes(), "text/html; charset=utf-8")
                    .await?,
            );
        }
        if let Some(png) = &ctx.png {
            let key = format!("reports/{}.png", ctx.job.id);
            uploaded.push(self.artifacts.put(&key, png.clone(), "image/png").await?);
        }

        ctx.artifacts.extend(uploaded.iter().cloned());
        Ok(json!({ "artifacts": uploaded }))
    }
}

struct FinalizeStep;

#[async_trait]
impl WorkflowStep for FinalizeStep {
    fn name(&self) -> &'static str {
        "finalize"
    }

    fn description(&self) -> &'static str {
        "Summarize the run"
    }

    fn criticality(&self) -> StepCriticality {
        StepCriticality::Critical
    }

    async fn execute(&self, ctx: &mut StepContext) -> StepResult {
        let staging = ctx
            .staging
            .as_ref()
            .ok_or_else(|| StepError::MissingInput("no staging record".to_string()))?;

        Ok(json!({
            "stagingId": ctx.staging_id,
            "duplicate": ctx.duplicate,
            "paidCount": staging.content.paid.len(),
            "organicCount": staging.content.organic.len(),
            "artifacts": ctx.artifacts,
        }))
    }
}
