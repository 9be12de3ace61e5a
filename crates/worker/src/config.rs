//! Worker configuration loaded from environment variables.

use std::time::Duration;

use crate::error::WorkerError;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `NUM_WORKERS`: orders run concurrently, at least 1 (default: `1`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `RUN_DEADLINE_SECS`: overall budget per order run (default: none)
/// - `PAYMENT_FAILURE_RATE`: share of simulated gateway outages (default: `0.1`)
/// - `SIMULATE_LATENCY`: add per-service delays to the simulated services
///   (default: `false`)
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub host: String,
    pub port: u16,
    pub num_workers: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    pub run_deadline: Option<Duration>,
    pub payment_failure_rate: f64,
    pub simulate_latency: bool,
}

impl WorkerConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for unset ones. Set but malformed values are an error.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let defaults = Self::default();

        let num_workers = parse(&lookup, "NUM_WORKERS")?.unwrap_or(defaults.num_workers);
        if num_workers < 1 {
            return Err(WorkerError::invalid("NUM_WORKERS", "must be at least 1"));
        }

        let payment_failure_rate: f64 =
            parse(&lookup, "PAYMENT_FAILURE_RATE")?.unwrap_or(defaults.payment_failure_rate);
        if !(0.0..=1.0).contains(&payment_failure_rate) {
            return Err(WorkerError::invalid(
                "PAYMENT_FAILURE_RATE",
                "must be between 0 and 1",
            ));
        }

        let run_deadline = match parse::<u64>(&lookup, "RUN_DEADLINE_SECS")? {
            Some(0) => {
                return Err(WorkerError::invalid(
                    "RUN_DEADLINE_SECS",
                    "must be greater than zero",
                ));
            }
            secs => secs.map(Duration::from_secs),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            num_workers,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
            run_deadline,
            payment_failure_rate,
            simulate_latency: parse(&lookup, "SIMULATE_LATENCY")?
                .unwrap_or(defaults.simulate_latency),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, WorkerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| WorkerError::invalid(key, format!("{e}"))),
        None => Ok(None),
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            num_workers: 1,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            run_deadline: None,
            payment_failure_rate: 0.1,
            simulate_latency: false,
        }
    }
}
