//! # Configuration
//!
//! Environment-driven settings for the reminder host.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::{Context, Result};
use chrono::Duration;
use std::env;

/// Default minutes before the due time at which a reminder fires
pub const DEFAULT_LEAD_MINUTES: i64 = 60;

/// Longest accepted lead time: one leap year
pub const MAX_LEAD_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// How long before `due_time` the reminder fires
    pub lead_time: Duration,
    pub database_path: String,
    pub log_level: String,
    /// Whether the host grants exact wall-clock timers
    pub exact_timers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lead_time: Duration::minutes(DEFAULT_LEAD_MINUTES),
            database_path: "tasks.db".to_string(),
            log_level: "info".to_string(),
            exact_timers: true,
        }
    }
}

impl Config {
    /// Build the config from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let lead_time = match lookup("REMINDER_LEAD_MINUTES") {
            Some(raw) => {
                let minutes: i64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("REMINDER_LEAD_MINUTES is not a number: {raw}"))?;
                if !(1..=MAX_LEAD_MINUTES).contains(&minutes) {
                    return Err(anyhow::anyhow!(
                        "REMINDER_LEAD_MINUTES must be between 1 and {}, got {}",
                        MAX_LEAD_MINUTES,
                        minutes
                    ));
                }
                Duration::minutes(minutes)
            }
            None => defaults.lead_time,
        };

        let exact_timers = match lookup("EXACT_TIMERS") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow::anyhow!("EXACT_TIMERS must be true or false, got {}", raw))?,
            None => defaults.exact_timers,
        };

        Ok(Config {
            lead_time,
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            exact_timers,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
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
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.lead_time, Duration::hours(1));
        assert_eq!(config.database_path, "tasks.db");
        assert_eq!(config.log_level, "info");
        assert!(config.exact_timers);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("REMINDER_LEAD_MINUTES", "15"),
            ("DATABASE_PATH", "/tmp/t.db"),
            ("LOG_LEVEL", "debug"),
            ("EXACT_TIMERS", "off"),
        ]))
        .unwrap();
        assert_eq!(config.lead_time, Duration::minutes(15));
        assert_eq!(config.database_path, "/tmp/t.db");
        assert_eq!(config.log_level, "debug");
        assert!(!config.exact_timers);
    }

    #[test]
    fn test_rejects_bad_lead_time() {
        assert!(Config::from_lookup(lookup_from(&[("REMINDER_LEAD_MINUTES", "soon")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("REMINDER_LEAD_MINUTES", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("REMINDER_LEAD_MINUTES", "-5")])).is_err());
    }

    #[test]
    fn test_lead_time_upper_bound() {
        let longest = MAX_LEAD_MINUTES.to_string();
        let config =
            Config::from_lookup(lookup_from(&[("REMINDER_LEAD_MINUTES", longest.as_str())])).unwrap();
        assert_eq!(config.lead_time, Duration::days(366));

        let too_long = (MAX_LEAD_MINUTES + 1).to_string();
        assert!(Config::from_lookup(lookup_from(&[("REMINDER_LEAD_MINUTES", too_long.as_str())])).is_err());
        let err = Config::from_lookup(lookup_from(&[("REMINDER_LEAD_MINUTES", "1000000000000")]))
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and"));
    }

    #[test]
    fn test_rejects_bad_bool() {
        let result = Config::from_lookup(lookup_from(&[("EXACT_TIMERS", "maybe")]));
        assert!(result.is_err());
    }
}
