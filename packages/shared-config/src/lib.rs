//! Shared configuration types for Resonance services
//!
//! This crate provides the configuration pieces every Resonance process reads
//! from its environment: the media library location, the deployment mode, and
//! helpers to parse typed values (including durations) out of environment
//! variables.

mod duration;
mod error;

pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Common configuration shared between all services
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Root directory of the media library
    pub music_library_path: PathBuf,

    /// Environment mode (development, staging, production)
    pub environment: Environment,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            music_library_path: PathBuf::from(get_env_or_default("MUSIC_LIBRARY_PATH", "/music")),
            environment: get_env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
        })
    }
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

/// Parse an environment variable holding a duration.
///
/// Unset or empty variables yield `None`.
pub fn parse_env_duration(name: &str) -> ConfigResult<Option<Duration>> {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => parse_duration(&val)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "prod".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "stage".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "anything".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(format!("{}", Environment::Production), "production");
        assert_eq!(format!("{}", Environment::Staging), "staging");
        assert_eq!(format!("{}", Environment::Development), "development");
    }

    #[test]
    fn test_parse_env_falls_back_to_default() {
        temp_env::with_var_unset("RESONANCE_TEST_PARSE_ENV", || {
            assert_eq!(parse_env("RESONANCE_TEST_PARSE_ENV", 7u64).unwrap(), 7);
        });
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        temp_env::with_var("RESONANCE_TEST_PARSE_ENV_BAD", Some("seven"), || {
            let err = parse_env("RESONANCE_TEST_PARSE_ENV_BAD", 7u64).unwrap_err();
            assert!(err.to_string().contains("RESONANCE_TEST_PARSE_ENV_BAD"));
        });
    }

    #[test]
    fn test_parse_env_duration() {
        temp_env::with_var("RESONANCE_TEST_DURATION", Some("90s"), || {
            assert_eq!(
                parse_env_duration("RESONANCE_TEST_DURATION").unwrap(),
                Some(Duration::from_secs(90))
            );
        });
        temp_env::with_var("RESONANCE_TEST_DURATION", Some(""), || {
            assert_eq!(parse_env_duration("RESONANCE_TEST_DURATION").unwrap(), None);
        });
        temp_env::with_var_unset("RESONANCE_TEST_DURATION", || {
            assert_eq!(parse_env_duration("RESONANCE_TEST_DURATION").unwrap(), None);
        });
    }
}
