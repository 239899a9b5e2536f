//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

use crate::scheduler::ReminderSchedule;

/// Default SQLite location.
pub const DEFAULT_SQLITE_PATH: &str = "./data/habit.db";

/// Default reference timezone offset (UTC+5).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 300;

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Reference timezone for calendar days and reminders.
    pub zone: FixedOffset,
    /// Local trigger times of the reminder loop.
    pub schedule: ReminderSchedule,
    /// Longest single sleep of the scheduler before it re-reads the clock.
    pub max_nap: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_url: sqlite_url_from_path(DEFAULT_SQLITE_PATH),
            pool_size: database::Database::DEFAULT_POOL_SIZE,
            zone: default_zone(),
            schedule: ReminderSchedule::default(),
            max_nap: Duration::from_secs(900),
        }
    }
}

fn default_zone() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}

impl TrackerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SQLITE_PATH` | SQLite path or URL | `./data/habit.db` |
    /// | `HABIT_UTC_OFFSET_MINUTES` | Reference timezone offset | `300` |
    /// | `HABIT_MIDDAY_REMINDER` | Midday reminder, `HH:MM` | `12:00` |
    /// | `HABIT_EVENING_REMINDER` | Last-chance reminder, `HH:MM` | `21:00` |
    /// | `HABIT_DB_POOL_SIZE` | Connection pool size | `20` |
    /// | `HABIT_SCHEDULER_MAX_NAP_SECS` | Longest scheduler sleep | `900` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("SQLITE_PATH")
            .map(|path| sqlite_url_from_path(&path))
            .unwrap_or(defaults.database_url);

        let zone = match lookup("HABIT_UTC_OFFSET_MINUTES") {
            Some(raw) => parse_offset_minutes(&raw)?,
            None => defaults.zone,
        };

        let midday = match lookup("HABIT_MIDDAY_REMINDER") {
            Some(raw) => parse_time_of_day("HABIT_MIDDAY_REMINDER", &raw)?,
            None => defaults.schedule.midday,
        };

        let evening = match lookup("HABIT_EVENING_REMINDER") {
            Some(raw) => parse_time_of_day("HABIT_EVENING_REMINDER", &raw)?,
            None => defaults.schedule.evening,
        };

        let pool_size = match lookup("HABIT_DB_POOL_SIZE") {
            Some(raw) => parse_positive("HABIT_DB_POOL_SIZE", &raw)?,
            None => defaults.pool_size,
        };

        let max_nap = match lookup("HABIT_SCHEDULER_MAX_NAP_SECS") {
            Some(raw) => {
                let secs = parse_positive("HABIT_SCHEDULER_MAX_NAP_SECS", &raw)?;
                Duration::from_secs(secs.into())
            }
            None => defaults.max_nap,
        };

        Ok(Self {
            database_url,
            pool_size,
            zone,
            schedule: ReminderSchedule { midday, evening },
            max_nap,
        })
    }
}

/// Turn a bare file path into a SQLite URL; URLs pass through.
pub fn sqlite_url_from_path(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", path)
    }
}

fn parse_offset_minutes(raw: &str) -> Result<FixedOffset, ConfigError> {
    let minutes: i32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOffset(raw.to_string()))?;

    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::InvalidOffset(raw.to_string()))
}

fn parse_time_of_day(key: &'static str, raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| ConfigError::InvalidTime {
        key,
        value: raw.to_string(),
    })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HABIT_UTC_OFFSET_MINUTES must be whole minutes within a day, got '{0}'")]
    InvalidOffset(String),

    #[error("{key} must be HH:MM, got '{value}'")]
    InvalidTime { key: &'static str, value: String },

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.database_url, "sqlite:./data/habit.db?mode=rwc");
        assert_eq!(config.zone.local_minus_utc(), 5 * 3600);
        assert_eq!(config.schedule.midday, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(config.schedule.evening, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert_eq!(config.pool_size, 20);
        assert_eq!(config.max_nap, Duration::from_secs(900));
    }

    #[test]
    fn test_overrides() {
        let config = TrackerConfig::from_lookup(lookup_from(&[
            ("SQLITE_PATH", "sqlite::memory:"),
            ("HABIT_UTC_OFFSET_MINUTES", "-90"),
            ("HABIT_MIDDAY_REMINDER", "09:30"),
            ("HABIT_EVENING_REMINDER", "22:15"),
            ("HABIT_DB_POOL_SIZE", "4"),
            ("HABIT_SCHEDULER_MAX_NAP_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.zone.local_minus_utc(), -90 * 60);
        assert_eq!(config.schedule.midday, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.schedule.evening, NaiveTime::from_hms_opt(22, 15, 0).unwrap());
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.max_nap, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values() {
        let err = TrackerConfig::from_lookup(lookup_from(&[("HABIT_UTC_OFFSET_MINUTES", "1440")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOffset(_)));

        let err = TrackerConfig::from_lookup(lookup_from(&[("HABIT_MIDDAY_REMINDER", "noon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTime { key: "HABIT_MIDDAY_REMINDER", .. }));

        let err = TrackerConfig::from_lookup(lookup_from(&[("HABIT_DB_POOL_SIZE", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }
}
