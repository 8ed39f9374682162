// Tracing setup: env filter, console layer, optional daily log file

use crate::config::{LogFormat, LogSettings};
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "serpwatch=info";
const LOG_FILE_PREFIX: &str = "serpwatch.log";

/// Install the global subscriber. The returned guard flushes the file writer
/// on drop and must live until exit.
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("failed to create env filter")?;

    // Console output goes to stderr so command output on stdout stays clean
    let console = match settings.format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
    };

    let (file, guard) = match &settings.dir {
        Some(dir) => {
            let dir = shellexpand::tilde(dir).into_owned();
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
