//! Process configuration, read from the environment.

use core::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use jobmesh_jobs::TrendingPolicy;
use jobmesh_jobs::trending::{APPLICATION_THRESHOLD, DAYS_THRESHOLD, HOT_DURATION_DAYS};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Which adapters back the bus and the subscription cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Redis,
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Backend::Memory),
            "redis" => Ok(Backend::Redis),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend: Backend,
    pub redis_url: String,
    pub stream_key: String,
    /// Hour of day (UTC) at which the daily sweep runs.
    pub sweep_hour_utc: u32,
    /// Debounce between an application and its trending check.
    pub trending_delay: Duration,
    pub application_threshold: u64,
    pub days_threshold: i64,
    pub hot_duration_days: i64,
    pub notification_ttl_days: i64,
    pub frontend_url: String,
    pub startup_retries: u32,
    pub startup_retry_delay: Duration,
    pub max_redeliveries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            backend: Backend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            stream_key: "jobmesh:events".to_string(),
            sweep_hour_utc: 1,
            trending_delay: Duration::from_millis(1_000),
            application_threshold: APPLICATION_THRESHOLD,
            days_threshold: DAYS_THRESHOLD,
            hot_duration_days: HOT_DURATION_DAYS,
            notification_ttl_days: 30,
            frontend_url: "http://localhost:3000".to_string(),
            startup_retries: 5,
            startup_retry_delay: Duration::from_millis(5_000),
            max_redeliveries: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            bind_addr: lookup("JOBMESH_BIND_ADDR").unwrap_or(defaults.bind_addr),
            backend: parsed(&lookup, "JOBMESH_BACKEND", defaults.backend)?,
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_key: lookup("JOBMESH_STREAM_KEY").unwrap_or(defaults.stream_key),
            sweep_hour_utc: parsed(&lookup, "JOBMESH_SWEEP_HOUR_UTC", defaults.sweep_hour_utc)?,
            trending_delay: millis(&lookup, "JOBMESH_TRENDING_DELAY_MS", defaults.trending_delay)?,
            application_threshold: parsed(
                &lookup,
                "JOBMESH_APPLICATION_THRESHOLD",
                defaults.application_threshold,
            )?,
            days_threshold: parsed(&lookup, "JOBMESH_DAYS_THRESHOLD", defaults.days_threshold)?,
            hot_duration_days: parsed(
                &lookup,
                "JOBMESH_HOT_DURATION_DAYS",
                defaults.hot_duration_days,
            )?,
            notification_ttl_days: parsed(
                &lookup,
                "JOBMESH_NOTIFICATION_TTL_DAYS",
                defaults.notification_ttl_days,
            )?,
            frontend_url: lookup("JOBMESH_FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.frontend_url),
            startup_retries: parsed(&lookup, "JOBMESH_STARTUP_RETRIES", defaults.startup_retries)?,
            startup_retry_delay: millis(
                &lookup,
                "JOBMESH_STARTUP_RETRY_DELAY_MS",
                defaults.startup_retry_delay,
            )?,
            max_redeliveries: parsed(&lookup, "JOBMESH_MAX_REDELIVERIES", defaults.max_redeliveries)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool, String); 5] = [
            ("JOBMESH_SWEEP_HOUR_UTC", self.sweep_hour_utc < 24, self.sweep_hour_utc.to_string()),
            ("JOBMESH_DAYS_THRESHOLD", self.days_threshold > 0, self.days_threshold.to_string()),
            ("JOBMESH_HOT_DURATION_DAYS", self.hot_duration_days > 0, self.hot_duration_days.to_string()),
            (
                "JOBMESH_NOTIFICATION_TTL_DAYS",
                self.notification_ttl_days > 0,
                self.notification_ttl_days.to_string(),
            ),
            ("JOBMESH_MAX_REDELIVERIES", self.max_redeliveries > 0, self.max_redeliveries.to_string()),
        ];

        match checks.into_iter().find(|(_, ok, _)| !ok) {
            Some((key, _, value)) => Err(ConfigError::Invalid { key, value }),
            None => Ok(()),
        }
    }

    pub fn trending_policy(&self) -> TrendingPolicy {
        TrendingPolicy::new(
            self.application_threshold,
            self.days_threshold,
            self.hot_duration_days,
        )
    }

    pub fn notification_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.notification_ttl_days)
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parsed(lookup, key, default.as_millis() as u64).map(Duration::from_millis)
}
