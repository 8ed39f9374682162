// Layered settings: defaults < TOML file < SERPWATCH__SECTION__KEY env vars

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use serpwatch_core::application::processor::constants::*;
use serpwatch_core::application::{ProcessorConfig, RetryPolicy, SearchDefaults};
use serpwatch_infra_http::HttpProviderConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SERPWATCH";
const DEFAULT_CONFIG_NAME: &str = "serpwatch";
const FALLBACK_DATA_DIR: &str = "~/.serpwatch";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub provider: ProviderSettings,
    pub processor: ProcessorSettings,
    pub workflow: WorkflowSettings,
    pub log: LogSettings,
}

/// Unset paths are derived from `data_dir`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: Option<String>,
    pub staging_db: Option<String>,
    pub results_dir: Option<String>,
    pub artifacts_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub source: String,
    pub device: String,
    pub locale: String,
    pub pages: u32,
    pub parse: bool,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let search = SearchDefaults::default();
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            source: search.source,
            device: search.device,
            locale: search.locale,
            pages: search.pages,
            parse: search.parse,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    pub batch_size: usize,
    pub poll_max_attempts: u32,
    pub poll_delay_secs: u64,
    pub poll_timeout_secs: u64,
    pub max_job_age_secs: u64,
    pub idle_interval_secs: u64,
    pub extended_idle_interval_secs: u64,
    pub idle_cycles_before_backoff: u32,
    pub busy_interval_secs: u64,
    pub error_cooldown_secs: u64,
    pub concurrency: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            poll_delay_secs: DEFAULT_POLL_DELAY.as_secs(),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
            max_job_age_secs: DEFAULT_MAX_JOB_AGE.as_secs(),
            idle_interval_secs: DEFAULT_IDLE_INTERVAL.as_secs(),
            extended_idle_interval_secs: DEFAULT_EXTENDED_IDLE_INTERVAL.as_secs(),
            idle_cycles_before_backoff: DEFAULT_IDLE_CYCLES_BEFORE_BACKOFF,
            busy_interval_secs: DEFAULT_BUSY_INTERVAL.as_secs(),
            error_cooldown_secs: DEFAULT_ERROR_COOLDOWN.as_secs(),
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub downstream_wait_attempts: u32,
    pub downstream_wait_delay_secs: u64,
    pub downstream_wait_timeout_secs: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            downstream_wait_attempts: DEFAULT_DOWNSTREAM_WAIT_ATTEMPTS,
            downstream_wait_delay_secs: DEFAULT_DOWNSTREAM_WAIT_DELAY.as_secs(),
            downstream_wait_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Daily-rotated log files go here when set
    pub dir: Option<String>,
}

/// Fully resolved on-disk locations
#[derive(Debug, Clone, PartialEq)]
pub struct StoragePaths {
    pub queue_dir: PathBuf,
    pub staging_db_url: String,
    pub results_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; otherwise `serpwatch.toml`
    /// in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    fn load_with_env(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) => expand(dir),
            None => ProjectDirs::from("dev", "serpwatch", "serpwatch")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| expand(FALLBACK_DATA_DIR)),
        }
    }

    pub fn paths(&self) -> StoragePaths {
        let data_dir = self.data_dir();
        let resolve = |value: &Option<String>, default: &str| {
            value
                .as_deref()
                .map(expand)
                .unwrap_or_else(|| data_dir.join(default))
        };

        let staging_db_url = match self.storage.staging_db.as_deref() {
            Some(db) if db.starts_with("sqlite:") => db.to_string(),
            Some(db) => sqlite_url(&expand(db)),
            None => sqlite_url(&data_dir.join("staging.db")),
        };

        StoragePaths {
            queue_dir: data_dir.join("queues"),
            staging_db_url,
            results_dir: resolve(&self.storage.results_dir, "results"),
            artifacts_dir: resolve(&self.storage.artifacts_dir, "artifacts"),
        }
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        let p = &self.processor;
        ProcessorConfig {
            batch_size: p.batch_size,
            poll_max_attempts: p.poll_max_attempts,
            poll_delay: Duration::from_secs(p.poll_delay_secs),
            poll_timeout: Duration::from_secs(p.poll_timeout_secs),
            max_job_age: Duration::from_secs(p.max_job_age_secs),
            idle_interval: Duration::from_secs(p.idle_interval_secs),
            extended_idle_interval: Duration::from_secs(p.extended_idle_interval_secs),
            idle_cycles_before_backoff: p.idle_cycles_before_backoff,
            busy_interval: Duration::from_secs(p.busy_interval_secs),
            error_cooldown: Duration::from_secs(p.error_cooldown_secs),
            concurrency: p.concurrency,
        }
    }

    pub fn downstream_policy(&self) -> RetryPolicy {
        let w = &self.workflow;
        RetryPolicy::new(
            w.downstream_wait_attempts,
            Duration::from_secs(w.downstream_wait_delay_secs),
            Duration::from_secs(w.downstream_wait_timeout_secs),
        )
    }

    pub fn search_defaults(&self) -> SearchDefaults {
        let p = &self.provider;
        SearchDefaults {
            source: p.source.clone(),
            device: p.device.clone(),
            locale: p.locale.clone(),
            pages: p.pages,
            parse: p.parse,
            context: Vec::new(),
        }
    }

    pub fn http_provider_config(&self) -> Result<HttpProviderConfig> {
        let p = &self.provider;
        if p.base_url.trim().is_empty() {
            anyhow::bail!("provider.base_url is not set (SERPWATCH__PROVIDER__BASE_URL)");
        }
        Ok(HttpProviderConfig {
            base_url: p.base_url.clone(),
            username: p.username.clone(),
            password: p.password.clone(),
            request_timeout: Duration::from_secs(p.request_timeout_secs),
        })
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}
