use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::core::scheduler::{SchedulerOptions, DEFAULT_DESCRIPTION_PREFIX};
use crate::core::utils::{write_atomic, PathResolver};
use crate::domain::ReportFormat;
use crate::errors::{ExpenseError, Result};
use crate::queue::{WorkerOptions, DEFAULT_CLAIM_LEASE};

const TIME_FORMAT: &str = "%H:%M";
pub const DEFAULT_LOG_FILTER: &str = "expense_core=info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub reports: ReportsConfig,
    pub worker: WorkerConfig,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            reports: ReportsConfig::default(),
            worker: WorkerConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub tick_deadline_secs: u64,
    pub call_timeout_secs: u64,
    /// Daily materialization time, "HH:MM" UTC.
    pub daily_at: String,
    pub description_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            tick_deadline_secs: 300,
            call_timeout_secs: 10,
            daily_at: "00:00".into(),
            description_prefix: DEFAULT_DESCRIPTION_PREFIX.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub monthly_day: u32,
    pub monthly_at: String,
    pub default_format: ReportFormat,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            monthly_day: 1,
            monthly_at: "00:00".into(),
            default_format: ReportFormat::Pdf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    /// Age after which a claimed but unacked file-queue message counts as
    /// abandoned and is handed to the next consumer that recovers.
    pub claim_lease_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval_ms: 500,
            claim_lease_secs: DEFAULT_CLAIM_LEASE.as_secs(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.concurrency == 0 {
            return Err(config_error("scheduler.concurrency must be at least 1"));
        }
        if self.scheduler.tick_deadline_secs == 0 {
            return Err(config_error("scheduler.tick_deadline_secs must be at least 1"));
        }
        if self.scheduler.call_timeout_secs == 0 {
            return Err(config_error("scheduler.call_timeout_secs must be at least 1"));
        }
        if self.worker.concurrency == 0 {
            return Err(config_error("worker.concurrency must be at least 1"));
        }
        if !(1..=28).contains(&self.reports.monthly_day) {
            return Err(config_error(format!(
                "reports.monthly_day must be between 1 and 28, got {}",
                self.reports.monthly_day
            )));
        }
        self.daily_time()?;
        self.monthly_time()?;
        Ok(())
    }

    pub fn daily_time(&self) -> Result<NaiveTime> {
        parse_time("scheduler.daily_at", &self.scheduler.daily_at)
    }

    pub fn monthly_time(&self) -> Result<NaiveTime> {
        parse_time("reports.monthly_at", &self.reports.monthly_at)
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            concurrency: self.scheduler.concurrency,
            tick_deadline: Duration::from_secs(self.scheduler.tick_deadline_secs),
            call_timeout: Duration::from_secs(self.scheduler.call_timeout_secs),
            description_prefix: self.scheduler.description_prefix.clone(),
        }
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.worker.claim_lease_secs)
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            concurrency: self.worker.concurrency,
            poll_interval: Duration::from_millis(self.worker.poll_interval_ms),
        }
    }
}

fn config_error(message: impl Into<String>) -> ExpenseError {
    ExpenseError::Config(message.into())
}

fn parse_time(field: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|_| config_error(format!("{field} must be HH:MM, got `{raw}`")))
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        Self {
            path: PathResolver::config_file_in(base.as_ref()),
        }
    }

    /// Reads and validates the file, or returns defaults when there is none.
    pub async fn load(&self) -> Result<Config> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(err) => return Err(err.into()),
        };
        let config: Config = serde_json::from_str(&data)
            .map_err(|err| config_error(format!("{}: {err}", self.path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
