//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. Sources are merged in order (later overrides earlier):
//!
//! 1. Built-in defaults
//! 2. YAML config file (default: `config.yaml`)
//! 3. Environment variables prefixed with `CUMULUS_` (double underscores
//!    for nesting)
//!
//! ```bash
//! # Cap usage reports at 31 days
//! CUMULUS_MAX_REPORT_DAYS=31
//!
//! # Give aggregation a tighter deadline
//! CUMULUS_AGGREGATION_DEADLINE=10s
//! ```

use std::time::{Duration, Instant};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::usage::AggregationOptions;

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Wall-clock budget for a single usage aggregation call. Expired
    /// aggregations fail with a retryable timeout carrying the completed
    /// days.
    #[serde(with = "humantime_serde")]
    pub aggregation_deadline: Duration,

    /// Longest report range accepted, in days. Aggregation cost is linear
    /// in days, so this bounds worst-case request work.
    pub max_report_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aggregation_deadline: Duration::from_secs(30),
            max_report_days: 366,
        }
    }
}

impl Config {
    /// Load configuration from the given YAML file (if it exists) and the
    /// environment.
    pub fn load(path: &str) -> crate::Result<Config> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("CUMULUS_").split("__"))
            .extract()
            .map_err(anyhow::Error::from)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.max_report_days == 0 {
            return Err(anyhow::anyhow!("max_report_days must be at least 1").into());
        }
        Ok(())
    }

    /// Aggregation options for a request starting now.
    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            filters: None,
            deadline: Some(Instant::now() + self.aggregation_deadline),
            max_days: Some(self.max_report_days),
        }
    }
}
