//! Worker configuration loaded from environment variables
//!
//! Configuration is loaded from environment variables with sensible defaults
//! for development environments.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use resonance_shared_config::{
    parse_duration, parse_env, parse_env_duration, CommonConfig, Environment,
};

use crate::tasks::{TaskManagerOptions, TaskSchedule};

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Delay between schedule checks while the queue is empty
    pub poll_interval: Duration,

    /// Recurring delay per task slug
    pub schedule: TaskSchedule,

    /// Cancel a run once it exceeds this
    pub soft_timeout: Option<Duration>,

    /// Bind address of the task control endpoint
    pub http_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let poll_interval = parse_duration(
            &env::var("WORKER_POLL_INTERVAL").unwrap_or_else(|_| "1".to_string()),
        )
        .context("Invalid WORKER_POLL_INTERVAL value")?;
        if poll_interval.is_zero() {
            bail!("Invalid WORKER_POLL_INTERVAL value: must be greater than zero");
        }

        Ok(Self {
            common,
            poll_interval,

            schedule: env::var("TASK_SCHEDULE")
                .unwrap_or_default()
                .parse()
                .context("Invalid TASK_SCHEDULE value")?,

            soft_timeout: parse_env_duration("TASK_SOFT_TIMEOUT")
                .context("Invalid TASK_SOFT_TIMEOUT value")?
                .filter(|timeout| !timeout.is_zero()),

            http_addr: parse_env("WORKER_HTTP_ADDR", SocketAddr::from(([0, 0, 0, 0], 8081)))
                .context("Invalid WORKER_HTTP_ADDR value")?,
        })
    }

    /// Options handed to the task manager
    pub fn manager_options(&self) -> TaskManagerOptions {
        TaskManagerOptions {
            poll_interval: self.poll_interval,
            soft_timeout: self.soft_timeout,
        }
    }

    /// Get music library path
    pub fn music_library_path(&self) -> &PathBuf {
        &self.common.music_library_path
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKER_VARS: &[&str] = &[
        "WORKER_POLL_INTERVAL",
        "TASK_SCHEDULE",
        "TASK_SOFT_TIMEOUT",
        "WORKER_HTTP_ADDR",
    ];

    /// Run `f` with only the given worker variables set
    fn with_worker_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let mut kvs: Vec<(&str, Option<&str>)> =
            WORKER_VARS.iter().map(|name| (*name, None)).collect();
        for (name, value) in vars {
            if let Some(slot) = kvs.iter_mut().find(|(k, _)| k == name) {
                slot.1 = Some(*value);
            }
        }
        temp_env::with_vars(kvs, f)
    }

    #[test]
    fn test_defaults() {
        with_worker_env(&[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.poll_interval, Duration::from_secs(1));
            assert!(config.schedule.is_empty());
            assert_eq!(config.soft_timeout, None);
            assert_eq!(config.http_addr, "0.0.0.0:8081".parse().unwrap());
            assert_eq!(config.manager_options(), TaskManagerOptions::default());
        });
    }

    #[test]
    fn test_custom_values() {
        with_worker_env(
            &[
                ("WORKER_POLL_INTERVAL", "5"),
                ("TASK_SCHEDULE", "scan=24h,register=30m"),
                ("TASK_SOFT_TIMEOUT", "1h"),
                ("WORKER_HTTP_ADDR", "127.0.0.1:9000"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.poll_interval, Duration::from_secs(5));
                assert_eq!(
                    config.schedule.delay_for("scan"),
                    Some(Duration::from_secs(86_400))
                );
                assert_eq!(config.soft_timeout, Some(Duration::from_secs(3_600)));
                assert_eq!(config.http_addr.port(), 9000);
            },
        );
    }

    #[test]
    fn test_zero_soft_timeout_disables_it() {
        with_worker_env(&[("TASK_SOFT_TIMEOUT", "0")], || {
            assert_eq!(Config::from_env().unwrap().soft_timeout, None);
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (name, value) in [
            ("WORKER_POLL_INTERVAL", "soon"),
            ("WORKER_POLL_INTERVAL", "0"),
            ("TASK_SCHEDULE", "scan"),
            ("TASK_SOFT_TIMEOUT", "forever"),
            ("WORKER_HTTP_ADDR", "not-an-address"),
        ] {
            with_worker_env(&[(name, value)], || {
                let err = Config::from_env().unwrap_err();
                assert!(
                    format!("{:#}", err).contains(name),
                    "{} should be reported for {}",
                    name,
                    value
                );
            });
        }
    }
}
