//! Queue configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for estimation and synchronization.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Minutes of wait added per patient ahead in the queue
    pub base_minutes_per_patient: f64,
    /// Multiplier applied to urgent check-ins
    pub urgent_multiplier: f64,
    /// Period of the "now" reference refresh, in seconds
    pub clock_tick_secs: u64,
    /// Delay before resubscribing after a feed error, in milliseconds
    pub resubscribe_delay_ms: u64,
    /// Enforce forward-only transitions and a single consultation in the
    /// staff workflow helpers
    pub strict_workflow: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_minutes_per_patient: 15.0,
            urgent_multiplier: 0.5,
            clock_tick_secs: 60,
            resubscribe_delay_ms: 1000,
            strict_workflow: true,
        }
    }
}

impl QueueConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: QueueConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.base_minutes_per_patient.is_finite() || self.base_minutes_per_patient < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "base_minutes_per_patient must be a non-negative number, got {}",
                self.base_minutes_per_patient
            )));
        }
        if !self.urgent_multiplier.is_finite() || self.urgent_multiplier < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "urgent_multiplier must be a non-negative number, got {}",
                self.urgent_multiplier
            )));
        }
        if self.clock_tick_secs == 0 {
            return Err(ConfigError::Invalid("clock_tick_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn clock_tick(&self) -> Duration {
        Duration::from_secs(self.clock_tick_secs)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.base_minutes_per_patient, 15.0);
        assert_eq!(config.urgent_multiplier, 0.5);
        assert_eq!(config.clock_tick(), Duration::from_secs(60));
        assert_eq!(config.resubscribe_delay(), Duration::from_secs(1));
        assert!(config.strict_workflow);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = QueueConfig::from_json_str(r#"{"clock_tick_secs": 5}"#).unwrap();
        assert_eq!(config.clock_tick_secs, 5);
        assert_eq!(config.resubscribe_delay_ms, 1000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            QueueConfig::from_json_str(r#"{"clock_tick_secs": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QueueConfig::from_json_str(r#"{"urgent_multiplier": -1.0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QueueConfig::from_json_str("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"strict_workflow": false}}"#).unwrap();

        let config = QueueConfig::from_file(file.path()).unwrap();
        assert!(!config.strict_workflow);
    }
}
