//! Serpwatch - operator binary for the SERP collection engine

mod config;
mod context;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serpwatch_core::application::{shutdown_channel, PollingProcessor, QueueStatistics, RunReport};
use serpwatch_core::domain::JobRecord;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::{info, warn};

use crate::config::Settings;
use crate::context::AppContext;

#[derive(Parser)]
#[command(name = "serpwatch")]
#[command(about = "SERP collection job engine", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML settings file (default: ./serpwatch.toml when present)
    #[arg(short, long, env = "SERPWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process jobs until Ctrl+C
    Run,

    /// Run a fixed number of cycles
    Cycles {
        /// Number of cycles
        count: u32,
    },

    /// Run a single cycle
    Once,

    /// Show queue statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit a new search to the provider and track it
    Submit {
        #[arg(short, long)]
        query: String,

        #[arg(short, long)]
        location: String,
    },

    /// Track a provider job that was submitted elsewhere
    Enqueue {
        /// Provider job id
        #[arg(long)]
        id: String,

        #[arg(short, long)]
        query: String,

        #[arg(short, long)]
        location: String,
    },

    /// Remove jobs recorded in more than one queue
    Reconcile,
}

#[derive(Tabled)]
struct QueueRow {
    queue: &'static str,
    jobs: usize,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    query: String,
    location: String,
    status: String,
}

impl From<&JobRecord> for JobRow {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id.clone(),
            query: job.query.clone(),
            location: job.location.clone(),
            status: job.status.queue_name().to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    let _log_guard = logging::init(&settings.log)?;

    info!("Serpwatch v{} starting", serpwatch_core::VERSION);
    let context = AppContext::build(settings).await?;

    match cli.command {
        Commands::Run => {
            let report = run_processor(context.processor().await?, None).await?;
            print_run(&report);
        }

        Commands::Cycles { count } => {
            let report = run_processor(context.processor().await?, Some(count)).await?;
            print_run(&report);
        }

        Commands::Once => {
            let report = run_processor(context.processor().await?, Some(1)).await?;
            print_run(&report);
        }

        Commands::Stats { json } => {
            let stats = context.lifecycle().statistics().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }

        Commands::Submit { query, location } => {
            let job = context.submitter()?.submit(&query, &location).await?;
            println!("{}", "✓ Search submitted".green().bold());
            println!("{}", Table::new([JobRow::from(&job)]));
        }

        Commands::Enqueue {
            id,
            query,
            location,
        } => {
            let job = context.enqueue(id, &query, &location).await?;
            println!("{}", "✓ Job enqueued".green().bold());
            println!("{}", Table::new([JobRow::from(&job)]));
        }

        Commands::Reconcile => {
            let report = context.lifecycle().reconcile().await?;
            if report.is_clean() {
                println!("{}", "✓ Queues are consistent".green().bold());
            } else {
                println!(
                    "{}",
                    format!("Removed {} stale entries", report.removed.len())
                        .yellow()
                        .bold()
                );
                for (job_id, queue) in &report.removed {
                    println!("  {} from {}", job_id, queue.queue_name());
                }
            }
        }
    }

    Ok(())
}

/// Drive the processor, stopping early on Ctrl+C. The first signal lets the
/// in-flight cycle settle every job it selected; a second one forces exit.
/// A fatal processor error becomes the process exit status.
async fn run_processor(processor: PollingProcessor, limit: Option<u32>) -> Result<RunReport> {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let mut handle = tokio::spawn(async move {
        match limit {
            Some(cycles) => processor.run_cycles(cycles, shutdown_rx).await,
            None => processor.run(shutdown_rx).await,
        }
    });

    tokio::select! {
        joined = &mut handle => {
            return Ok(joined.context("processor task panicked")??);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received, finishing current cycle (Ctrl+C again to force)");
            shutdown_tx.shutdown();
        }
    }

    tokio::select! {
        joined = &mut handle => Ok(joined.context("processor task panicked")??),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            warn!("Second shutdown signal, abandoning in-flight cycle");
            handle.abort();
            anyhow::bail!("forced shutdown; queues are reconciled on the next start")
        }
    }
}

fn print_run(report: &RunReport) {
    let totals = &report.totals;
    println!(
        "{}",
        format!("Ran {} cycle(s)", report.cycles).cyan().bold()
    );
    println!("  started:   {}", totals.started);
    println!("  completed: {}", totals.completed.to_string().green());
    println!("  failed:    {}", totals.failed.to_string().red());
    println!("  deferred:  {}", totals.deferred.to_string().yellow());
    if totals.duplicates > 0 {
        println!("  duplicates: {}", totals.duplicates);
    }
    if totals.errors > 0 {
        println!("  errors:    {}", totals.errors.to_string().red());
    }
}

fn print_stats(stats: &QueueStatistics) {
    println!("{}", "Queue Statistics".cyan().bold());
    println!();

    let rows = [
        QueueRow {
            queue: "submitted",
            jobs: stats.submitted_count,
        },
        QueueRow {
            queue: "in_progress",
            jobs: stats.in_progress_count,
        },
        QueueRow {
            queue: "completed",
            jobs: stats.completed_count,
        },
        QueueRow {
            queue: "failed",
            jobs: stats.failed_count,
        },
    ];
    println!("{}", Table::new(rows));
    println!();
    println!("Completion rate: {:.1}%", stats.completion_rate);
    match stats.average_processing_time_ms {
        Some(ms) => println!("Avg processing time: {:.0} ms", ms),
        None => println!("Avg processing time: {}", "n/a".dimmed()),
    }
}
