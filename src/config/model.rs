use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::*;
use crate::external_sort::SortConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub sort: SortConfig,
    pub workers: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound on files indexed at the same time.
    pub max_parallelism: usize,
    pub batch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `silent`, `normal` or `verbose`.
    pub verbosity: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: DEFAULT_VERBOSITY.to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallelism < MIN_MAX_PARALLELISM || self.max_parallelism > MAX_MAX_PARALLELISM {
            return Err(anyhow::anyhow!(
                "Max parallelism must be between {} and {}",
                MIN_MAX_PARALLELISM, MAX_MAX_PARALLELISM
            ));
        }

        if self.batch_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Batch timeout must be at least one second"));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        match self.verbosity.as_str() {
            "silent" | "normal" | "verbose" => Ok(()),
            other => Err(anyhow::anyhow!(
                "Illegal verbosity '{}'. Allowed values are: silent, normal, verbose",
                other
            )),
        }
    }
}

impl SiftConfig {
    pub fn validate(&self) -> Result<()> {
        self.sort.validate()?;
        self.workers.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
