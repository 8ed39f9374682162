// Polling processor - job execution loop

mod backoff;
pub mod constants;
mod shutdown;

pub use backoff::IdleBackoff;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::lifecycle::{JobLifecycleManager, MoveOutcome};
use crate::application::retry::{self, Attempt, RetryOutcome, RetryPolicy};
use crate::application::workflow::{summarize, SerpWorkflow, StepContext};
use crate::domain::{CompletionMetadata, FailureInfo, FailureKind, JobRecord, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{ProviderError, ProviderJobStatus, SerpProvider, TimeProvider};
use constants::*;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Processor tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    pub batch_size: usize,
    pub poll_max_attempts: u32,
    pub poll_delay: Duration,
    pub poll_timeout: Duration,
    pub max_job_age: Duration,
    pub idle_interval: Duration,
    pub extended_idle_interval: Duration,
    pub idle_cycles_before_backoff: u32,
    pub busy_interval: Duration,
    pub error_cooldown: Duration,
    /// In-progress jobs handled at once; 1 processes the batch sequentially
    pub concurrency: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            poll_delay: DEFAULT_POLL_DELAY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_job_age: DEFAULT_MAX_JOB_AGE,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            extended_idle_interval: DEFAULT_EXTENDED_IDLE_INTERVAL,
            idle_cycles_before_backoff: DEFAULT_IDLE_CYCLES_BEFORE_BACKOFF,
            busy_interval: DEFAULT_BUSY_INTERVAL,
            error_cooldown: DEFAULT_ERROR_COOLDOWN,
            concurrency: 1,
        }
    }
}

impl ProcessorConfig {
    pub fn poll_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.poll_max_attempts, self.poll_delay, self.poll_timeout)
    }
}

/// Counters for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub deferred: usize,
    pub duplicates: usize,
    pub errors: usize,
    /// submitted + in_progress after the cycle
    pub remaining: usize,
}

impl CycleReport {
    /// Nothing was started, finished or deferred
    pub fn is_idle(&self) -> bool {
        self.started == 0 && self.completed == 0 && self.failed == 0 && self.deferred == 0
    }

    fn absorb(&mut self, other: &CycleReport) {
        self.started += other.started;
        self.completed += other.completed;
        self.failed += other.failed;
        self.deferred += other.deferred;
        self.duplicates += other.duplicates;
        self.errors += other.errors;
        self.remaining = other.remaining;
    }
}

/// Totals across a multi-cycle run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub cycles: u32,
    pub totals: CycleReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed { duplicate: bool },
    Failed,
    Deferred,
    /// Job left the queue under us; nothing recorded
    Skipped,
}

/// Drives in-progress jobs against the provider and the workflow pipeline
pub struct PollingProcessor {
    lifecycle: Arc<JobLifecycleManager>,
    provider: Arc<dyn SerpProvider>,
    workflow: Arc<SerpWorkflow>,
    time_provider: Arc<dyn TimeProvider>,
    config: ProcessorConfig,
}

impl PollingProcessor {
    pub fn new(
        lifecycle: Arc<JobLifecycleManager>,
        provider: Arc<dyn SerpProvider>,
        workflow: Arc<SerpWorkflow>,
        time_provider: Arc<dyn TimeProvider>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            lifecycle,
            provider,
            workflow,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Run until shutdown; only fatal errors end the loop early
    pub async fn run(&self, shutdown: ShutdownToken) -> Result<RunReport> {
        self.drive(None, shutdown).await
    }

    /// Run at most `cycles` cycles (or until shutdown)
    pub async fn run_cycles(&self, cycles: u32, shutdown: ShutdownToken) -> Result<RunReport> {
        self.drive(Some(cycles), shutdown).await
    }

    async fn drive(&self, limit: Option<u32>, mut shutdown: ShutdownToken) -> Result<RunReport> {
        info!(
            batch_size = %self.config.batch_size,
            concurrency = %self.config.concurrency,
            "Processor started"
        );
        self.lifecycle.reconcile().await?;

        let mut backoff = IdleBackoff::new(
            self.config.idle_interval,
            self.config.extended_idle_interval,
            self.config.idle_cycles_before_backoff,
        );
        let mut report = RunReport::default();

        loop {
            if shutdown.is_shutdown() {
                info!("Processor shutting down");
                break;
            }

            let pause = match self.cycle(&shutdown).await {
                Ok(cycle) => {
                    report.totals.absorb(&cycle);
                    if !cycle.is_idle() {
                        backoff.record_busy();
                    }
                    if cycle.remaining > 0 {
                        self.config.busy_interval
                    } else {
                        backoff.record_idle()
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Fatal error, halting processor");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "Cycle failed");
                    report.totals.errors += 1;
                    self.config.error_cooldown
                }
            };
            report.cycles += 1;

            if limit.is_some_and(|n| report.cycles >= n) {
                break;
            }

            if !shutdown.sleep(pause).await {
                info!("Processor interrupted while sleeping");
                break;
            }
        }

        info!(
            cycles = %report.cycles,
            completed = %report.totals.completed,
            failed = %report.totals.failed,
            "Processor stopped"
        );
        Ok(report)
    }

    /// One pass: start up to `batch_size` submitted jobs, then work every
    /// in-progress job
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.cycle(&ShutdownToken::never()).await
    }

    /// A stop during the cycle ends provider polling early; every job in the
    /// batch still reaches a queue boundary before the cycle returns.
    async fn cycle(&self, shutdown: &ShutdownToken) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let submitted = self.lifecycle.list(JobStatus::Submitted).await?;
        for job in submitted.iter().take(self.config.batch_size) {
            match self.lifecycle.move_to_in_progress(&job.id).await {
                Ok(MoveOutcome::Moved) => report.started += 1,
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Could not start job");
                    report.errors += 1;
                }
            }
        }

        let in_progress = self.lifecycle.list(JobStatus::InProgress).await?;
        let mut outcomes = stream::iter(in_progress)
            .map(|job| self.process_job(job, shutdown))
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(JobOutcome::Completed { duplicate }) => {
                    report.completed += 1;
                    if duplicate {
                        report.duplicates += 1;
                    }
                }
                Ok(JobOutcome::Failed) => report.failed += 1,
                Ok(JobOutcome::Deferred) => report.deferred += 1,
                Ok(JobOutcome::Skipped) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(error = %e, "Job processing error");
                    report.errors += 1;
                }
            }
        }
        drop(outcomes);

        report.remaining = self.lifecycle.statistics().await?.pending_work();
        info!(
            started = %report.started,
            completed = %report.completed,
            failed = %report.failed,
            deferred = %report.deferred,
            remaining = %report.remaining,
            "Cycle finished"
        );
        Ok(report)
    }

    async fn process_job(&self, job: JobRecord, shutdown: &ShutdownToken) -> Result<JobOutcome> {
        let now = self.time_provider.now();
        let max_age_ms = self.config.max_job_age.as_millis() as i64;

        let over_age = match job.in_progress_age_ms(now) {
            Some(age_ms) if age_ms <= max_age_ms => None,
            Some(age_ms) => Some(age_ms),
            None => Some((now - job.submitted_at).num_milliseconds()),
        };
        if let Some(age_ms) = over_age {
            let timeout = AppError::TimeoutExceeded {
                job_id: job.id.clone(),
                age_ms,
            };
            warn!(job_id = %job.id, age_ms = %age_ms, "Job exceeded maximum age");
            return self.fail(&job, FailureKind::Timeout, timeout.to_string()).await;
        }

        let policy = self.config.poll_policy();
        let outcome = retry::execute_until(&policy, "poll", shutdown, |_| {
            let provider = self.provider.clone();
            let job_id = job.id.clone();
            async move { poll_once(provider.as_ref(), &job_id).await }
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                info!(job_id = %job.id, attempts = %attempts, "Provider results ready");
                self.complete_job(job, value).await
            }
            RetryOutcome::Terminal { error, .. } => {
                self.fail(&job, FailureKind::Provider, error.to_string())
                    .await
            }
            RetryOutcome::Exhausted {
                attempts,
                last_reason,
            } => {
                info!(
                    job_id = %job.id,
                    attempts = %attempts,
                    reason = %last_reason,
                    "Results not ready, deferring to next cycle"
                );
                Ok(JobOutcome::Deferred)
            }
            RetryOutcome::Interrupted { attempts } => {
                info!(job_id = %job.id, attempts = %attempts, "Polling stopped for shutdown, deferring");
                Ok(JobOutcome::Deferred)
            }
        }
    }

    async fn complete_job(&self, job: JobRecord, payload: Value) -> Result<JobOutcome> {
        let mut ctx = StepContext::new(job.clone(), payload);
        let run = self.workflow.run(&mut ctx).await?;

        if !run.success {
            let message = run
                .error
                .clone()
                .unwrap_or_else(|| "workflow failed".to_string());
            if run.retryable {
                warn!(job_id = %job.id, error = %message, "Workflow hit a transient failure, deferring");
                return Ok(JobOutcome::Deferred);
            }
            return self.fail(&job, FailureKind::Workflow, message).await;
        }

        // A completion inside the start millisecond still reports 1ms
        let processing_time_ms = job
            .in_progress_age_ms(self.time_provider.now())
            .unwrap_or(0)
            .max(1);
        let metadata = CompletionMetadata {
            processing_time_ms,
            summary: Some(summarize(&run, &ctx)),
        };

        match self.lifecycle.move_to_completed(&job.id, metadata).await? {
            MoveOutcome::NotFound => Ok(JobOutcome::Skipped),
            MoveOutcome::Moved | MoveOutcome::AlreadyInTarget => Ok(JobOutcome::Completed {
                duplicate: ctx.duplicate,
            }),
        }
    }

    async fn fail(&self, job: &JobRecord, kind: FailureKind, message: String) -> Result<JobOutcome> {
        error!(job_id = %job.id, kind = ?kind, error = %message, "Job failed");
        match self
            .lifecycle
            .move_to_failed(&job.id, FailureInfo::new(kind, message))
            .await?
        {
            MoveOutcome::NotFound => Ok(JobOutcome::Skipped),
            MoveOutcome::Moved | MoveOutcome::AlreadyInTarget => Ok(JobOutcome::Failed),
        }
    }
}

/// One status check; fetches results once the provider reports done
async fn poll_once(
    provider: &dyn SerpProvider,
    job_id: &str,
) -> std::result::Result<Attempt<Value>, ProviderError> {
    match provider.status(job_id).await? {
        ProviderJobStatus::Pending => Ok(Attempt::NotReady("pending".to_string())),
        ProviderJobStatus::Failed(reason) => Err(ProviderError::JobFailed(reason)),
        ProviderJobStatus::Done => {
            let payload = provider.results(job_id).await?;
            let has_results = payload
                .get("results")
                .and_then(Value::as_array)
                .is_some_and(|r| !r.is_empty());
            if !has_results {
                return Err(ProviderError::Malformed(format!(
                    "results for {} carry no entries",
                    job_id
                )));
            }
            Ok(Attempt::Ready(payload))
        }
    }
}
