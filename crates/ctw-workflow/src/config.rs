use std::time::Duration;

use ctw_db_memory::StorageBackend;
use serde::{Deserialize, Serialize};

use crate::drain::DrainLimits;
use crate::reconcile::WORKER_ID;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[source] config::ConfigError),

    #[error("config deserialize error: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.name.trim().is_empty() {
            return Err(ConfigError::Invalid("queue.name must not be empty".into()));
        }
        if let Some(secs) = self.queue.lease_time_secs {
            if secs == 0 || secs > MAX_LEASE_TIME_SECS {
                return Err(ConfigError::Invalid(format!(
                    "queue.lease_time_secs must be between 1 and {MAX_LEASE_TIME_SECS}"
                )));
            }
        }
        if self.drain.max_iterations == Some(0) {
            return Err(ConfigError::Invalid("drain.max_iterations must be > 0".into()));
        }
        if self.drain.time_budget_ms == Some(0) {
            return Err(ConfigError::Invalid("drain.time_budget_ms must be > 0".into()));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

/// Longest accepted claim lease: one day.
pub const MAX_LEASE_TIME_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// Lease of a claimed item, in seconds, defaulting to 60.
    ///
    /// TOML and environment overrides cannot express "unset", so files always
    /// yield a lease. Set it to `None` in code to claim with the queue's own
    /// default lease instead.
    #[serde(default = "default_lease_time_secs")]
    pub lease_time_secs: Option<u64>,
}

fn default_queue_name() -> String {
    WORKER_ID.into()
}
fn default_lease_time_secs() -> Option<u64> {
    Some(60)
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            lease_time_secs: default_lease_time_secs(),
        }
    }
}

impl QueueConfig {
    pub fn lease_time(&self) -> Option<Duration> {
        self.lease_time_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: Option<usize>,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: Option<u64>,
}

fn default_max_iterations() -> Option<usize> {
    Some(1000)
}
fn default_time_budget_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            time_budget_ms: default_time_budget_ms(),
        }
    }
}

impl DrainConfig {
    pub fn limits(&self) -> DrainLimits {
        DrainLimits {
            max_iterations: self.max_iterations,
            time_budget: self.time_budget_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{ConfigError, WorkflowConfig};
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<WorkflowConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("ctw.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., CTW__DRAIN__MAX_ITERATIONS=50
        builder = builder.add_source(
            Environment::with_prefix("CTW")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder.build().map_err(ConfigError::Build)?;
        let merged: WorkflowConfig = cfg.try_deserialize().map_err(ConfigError::Deserialize)?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<WorkflowConfig, ConfigError> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
