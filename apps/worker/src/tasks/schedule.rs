//! Recurring delays for scheduled tasks

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use resonance_shared_config::{format_duration, parse_duration, ConfigError};
use tokio::time::Instant;

/// Maps task slugs to the delay between two automatic runs.
///
/// Slugs without an entry are never enqueued automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSchedule {
    delays: HashMap<String, Duration>,
}

impl TaskSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the delay for a slug
    pub fn every(mut self, slug: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(slug.into(), delay);
        self
    }

    pub fn delay_for(&self, slug: &str) -> Option<Duration> {
        self.delays.get(slug).copied()
    }

    /// Next run time for `slug` counted from `now`, `None` meaning never
    pub fn next_run(&self, slug: &str, now: Instant) -> Option<Instant> {
        self.delay_for(slug).and_then(|delay| now.checked_add(delay))
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }
}

impl FromIterator<(String, Duration)> for TaskSchedule {
    fn from_iter<I: IntoIterator<Item = (String, Duration)>>(iter: I) -> Self {
        Self {
            delays: iter.into_iter().collect(),
        }
    }
}

/// Parses `slug=duration` pairs separated by commas, e.g. `scan=24h,register=30m`
impl FromStr for TaskSchedule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (slug, delay) = entry.split_once('=').ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "TASK_SCHEDULE".to_string(),
                        format!("expected slug=duration, got '{}'", entry),
                    )
                })?;
                let slug = slug.trim();
                if slug.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "TASK_SCHEDULE".to_string(),
                        format!("missing task slug in '{}'", entry),
                    ));
                }
                Ok((slug.to_string(), parse_duration(delay)?))
            })
            .collect()
    }
}

impl fmt::Display for TaskSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.delays.iter().collect();
        entries.sort();
        let rendered: Vec<String> = entries
            .into_iter()
            .map(|(slug, delay)| format!("{}={}", slug, format_duration(*delay)))
            .collect();
        f.write_str(&rendered.join(","))
    }
}
