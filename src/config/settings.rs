use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Service name used in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Poll interval in seconds between scheduler cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Maximum number of due rows processed per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Bounded worker pool size within a cycle
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// Default delivery attempt budget for new schedules
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    /// Default delay in seconds before a failed attempt is retried
    #[serde(default = "default_retry_interval")]
    pub default_retry_interval_seconds: u64,
}

fn default_service_name() -> String {
    "courier-engine".to_string()
}

fn default_poll_interval() -> u64 {
    60 // 1 minute
}

fn default_batch_size() -> usize {
    100
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_interval() -> u64 {
    300 // 5 minutes
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("engine.service_name", "courier-engine")?
            .set_default("scheduler.poll_interval_seconds", 60)?
            .set_default("scheduler.batch_size", 100)?
            .set_default("scheduler.worker_concurrency", 4)?
            .set_default("scheduler.default_max_attempts", 3)?
            .set_default("scheduler.default_retry_interval_seconds", 300)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // ENGINE__SERVICE_NAME, SCHEDULER__BATCH_SIZE, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            json_logs: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            batch_size: default_batch_size(),
            worker_concurrency: default_worker_concurrency(),
            default_max_attempts: default_max_attempts(),
            default_retry_interval_seconds: default_retry_interval(),
        }
    }
}
