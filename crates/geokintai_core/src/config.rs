//! Engine configuration.
//!
//! # Invariants
//! - Durations and default radius are strictly positive after `validate`.
//! - Blank environment values fall back to defaults.

use crate::model::place::DEFAULT_PLACE_RADIUS_METERS;
use crate::verification::{DEFAULT_EXIT_RECHECK_SECONDS, DEFAULT_STAY_DURATION_SECONDS};
use chrono::Duration;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ENV_STAY_SECONDS: &str = "GEOKINTAI_STAY_SECONDS";
pub const ENV_EXIT_RECHECK_SECONDS: &str = "GEOKINTAI_EXIT_RECHECK_SECONDS";
pub const ENV_DEFAULT_RADIUS_METERS: &str = "GEOKINTAI_DEFAULT_RADIUS_METERS";
pub const ENV_REQUIRE_BACKGROUND: &str = "GEOKINTAI_REQUIRE_BACKGROUND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
    NonPositive { key: &'static str },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: `{value}`"),
            Self::NonPositive { key } => write!(f, "{key} must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub stay_duration: Duration,
    pub exit_recheck_duration: Duration,
    pub default_radius_meters: f64,
    pub requires_background_recording: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stay_duration: Duration::seconds(DEFAULT_STAY_DURATION_SECONDS),
            exit_recheck_duration: Duration::seconds(DEFAULT_EXIT_RECHECK_SECONDS),
            default_radius_meters: DEFAULT_PLACE_RADIUS_METERS,
            requires_background_recording: true,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, applying defaults for absent or
    /// blank keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let stay_duration = match read(ENV_STAY_SECONDS) {
            Some(value) => Duration::seconds(parse_seconds(ENV_STAY_SECONDS, &value)?),
            None => defaults.stay_duration,
        };
        let exit_recheck_duration = match read(ENV_EXIT_RECHECK_SECONDS) {
            Some(value) => Duration::seconds(parse_seconds(ENV_EXIT_RECHECK_SECONDS, &value)?),
            None => defaults.exit_recheck_duration,
        };
        let default_radius_meters = match read(ENV_DEFAULT_RADIUS_METERS) {
            Some(value) => value
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_DEFAULT_RADIUS_METERS,
                    value: value.clone(),
                })?,
            None => defaults.default_radius_meters,
        };
        let requires_background_recording = match read(ENV_REQUIRE_BACKGROUND) {
            Some(value) => parse_flag(ENV_REQUIRE_BACKGROUND, &value)?,
            None => defaults.requires_background_recording,
        };

        let config = Self {
            stay_duration,
            exit_recheck_duration,
            default_radius_meters,
            requires_background_recording,
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// - `NonPositive` for a zero or negative duration or radius.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stay_duration <= Duration::zero() {
            return Err(ConfigError::NonPositive {
                key: ENV_STAY_SECONDS,
            });
        }
        if self.exit_recheck_duration <= Duration::zero() {
            return Err(ConfigError::NonPositive {
                key: ENV_EXIT_RECHECK_SECONDS,
            });
        }
        if !(self.default_radius_meters.is_finite() && self.default_radius_meters > 0.0) {
            return Err(ConfigError::NonPositive {
                key: ENV_DEFAULT_RADIUS_METERS,
            });
        }
        Ok(())
    }
}

fn parse_seconds(key: &'static str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, EngineConfig, ENV_DEFAULT_RADIUS_METERS, ENV_EXIT_RECHECK_SECONDS,
        ENV_REQUIRE_BACKGROUND, ENV_STAY_SECONDS,
    };
    use chrono::Duration;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.stay_duration, Duration::seconds(300));
        assert_eq!(config.exit_recheck_duration, Duration::seconds(120));
        assert_eq!(config.default_radius_meters, 100.0);
        assert!(config.requires_background_recording);
    }

    #[test]
    fn overrides_are_parsed_and_blank_values_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_STAY_SECONDS, "60"),
            (ENV_EXIT_RECHECK_SECONDS, "  "),
            (ENV_DEFAULT_RADIUS_METERS, "250.5"),
            (ENV_REQUIRE_BACKGROUND, "off"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.stay_duration, Duration::seconds(60));
        assert_eq!(config.exit_recheck_duration, Duration::seconds(120));
        assert_eq!(config.default_radius_meters, 250.5);
        assert!(!config.requires_background_recording);
    }

    #[test]
    fn rejects_garbage_and_non_positive_values() {
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[(ENV_STAY_SECONDS, "five")])),
            Err(ConfigError::InvalidValue {
                key: ENV_STAY_SECONDS,
                value: "five".to_string(),
            })
        );
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[(ENV_EXIT_RECHECK_SECONDS, "0")])),
            Err(ConfigError::NonPositive {
                key: ENV_EXIT_RECHECK_SECONDS,
            })
        );
    }
}
