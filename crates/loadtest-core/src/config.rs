//! Run configuration for a load test
//!
//! Arguments are layered with the following precedence:
//! 1. Values set by the caller after loading (CLI flags)
//! 2. `LOADTEST_*` environment variables
//! 3. A config file (`--config` or `LOADTEST_CONFIG`)
//! 4. Hardcoded defaults

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::error::{LoadTestError, Result};

/// Highest rate whose pacing interval is still at least one nanosecond.
pub const MAX_QPS: u64 = 1_000_000_000;

/// Immutable arguments for a single load test run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoadTestArgs {
    /// How long to generate load. Zero runs until stopped.
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,

    /// Target requests per second.
    pub qps: u64,

    /// Workers started before the first tick.
    pub workers: u64,

    /// Upper bound for autoscaling. Ignored when autoscale is off.
    pub max_workers: u64,

    /// Spawn extra workers when none is idle at tick time.
    pub autoscale: bool,

    /// Per-request timeout covering connect through response headers.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// HTTP method sent with every request.
    pub method: String,

    /// `stdout` or a file path for CSV result records.
    pub output_file: String,
}

impl Default for LoadTestArgs {
    fn default() -> Self {
        Self {
            duration: Duration::ZERO,
            qps: 100,
            workers: 100,
            max_workers: 100,
            autoscale: true,
            timeout: Duration::from_secs(30),
            method: "GET".to_string(),
            output_file: "stdout".to_string(),
        }
    }
}

impl LoadTestArgs {
    /// Load arguments from defaults, an optional config file, and the environment.
    ///
    /// When `path` is `None` the file named by `LOADTEST_CONFIG` is used if set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::set_defaults(Config::builder())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        } else if let Ok(config_path) = std::env::var("LOADTEST_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        // Example: LOADTEST_MAX_WORKERS=500
        builder = builder.add_source(Environment::with_prefix("LOADTEST").try_parsing(true));

        let args: LoadTestArgs = builder.build()?.try_deserialize()?;
        Ok(args)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> std::result::Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        let defaults = Self::default();
        builder
            .set_default("duration", "0")?
            .set_default("qps", defaults.qps)?
            .set_default("workers", defaults.workers)?
            .set_default("max_workers", defaults.max_workers)?
            .set_default("autoscale", defaults.autoscale)?
            .set_default("timeout", "30s")?
            .set_default("method", defaults.method)?
            .set_default("output_file", defaults.output_file)
    }

    /// Validate argument values before a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.qps == 0 {
            return Err(LoadTestError::invalid_config("qps must be > 0"));
        }

        if self.qps > MAX_QPS {
            return Err(LoadTestError::invalid_config(format!(
                "qps must be <= {}",
                MAX_QPS
            )));
        }

        if self.workers == 0 {
            return Err(LoadTestError::invalid_config("workers must be > 0"));
        }

        if self.timeout.is_zero() {
            return Err(LoadTestError::invalid_config("timeout must be > 0"));
        }

        if self.method.trim().is_empty() {
            return Err(LoadTestError::invalid_config("method must not be empty"));
        }

        Ok(())
    }

    /// The run deadline, or `None` when the run is unbounded.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        (!self.duration.is_zero()).then_some(self.duration)
    }
}

/// Parse a duration such as `500ms`, `10s`, `5m` or `1h`.
///
/// A bare number is taken as seconds, so `0` means "forever" for run length.
pub fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("duration cannot be empty".to_string());
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid numeric value in duration: '{}'", value))?;

    let seconds = |multiplier: u64| {
        amount
            .checked_mul(multiplier)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration out of range: '{}'", value))
    };

    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => seconds(1),
        "m" => seconds(60),
        "h" => seconds(60 * 60),
        _ => Err(format!(
            "unknown duration unit '{}'. Use 'ms', 's', 'm' or 'h'.",
            unit
        )),
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
