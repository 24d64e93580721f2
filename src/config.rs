//! Metrics configuration
//!
//! Tunables for pairing and aggregation. The defaults match the thresholds used
//! in the keystroke/stress study (2s hold ceiling, 5s interval ceiling, 200ms and
//! 500ms pauses, `Backspace` as the delete key).

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Default hold-duration discard ceiling (exclusive)
pub const DEFAULT_KHD_MAX_MS: i64 = 2000;

/// Default inter-key-interval discard ceiling (exclusive)
pub const DEFAULT_IKI_MAX_MS: i64 = 5000;

/// Default short pause threshold
pub const DEFAULT_PAUSE_SHORT_MS: i64 = 200;

/// Default long pause threshold
pub const DEFAULT_PAUSE_LONG_MS: i64 = 500;

/// Default delete key identifier
pub const DEFAULT_BACKSPACE_KEY: &str = "Backspace";

/// Standard deviation estimator used for `sd_*` and `cv_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdDevKind {
    /// Divide by n - 1. Needs at least two samples.
    #[default]
    Sample,
    /// Divide by n.
    Population,
}

/// Configuration threaded through the pairer and aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Hold durations at or above this value are discarded as stuck keys
    pub khd_max_ms: i64,
    /// Intervals at or above this value are discarded as breaks
    pub iki_max_ms: i64,
    /// Intervals strictly above this count toward `pause_count_200ms`
    pub pause_short_ms: i64,
    /// Intervals strictly above this count toward `pause_count_500ms`
    pub pause_long_ms: i64,
    /// Key identifier counted as a correction
    pub backspace_key: String,
    /// Estimator for standard deviations
    pub sd_kind: StdDevKind,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            khd_max_ms: DEFAULT_KHD_MAX_MS,
            iki_max_ms: DEFAULT_IKI_MAX_MS,
            pause_short_ms: DEFAULT_PAUSE_SHORT_MS,
            pause_long_ms: DEFAULT_PAUSE_LONG_MS,
            backspace_key: DEFAULT_BACKSPACE_KEY.to_string(),
            sd_kind: StdDevKind::default(),
        }
    }
}

impl MetricsConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: MetricsConfig = serde_json::from_str(json)
            .map_err(|e| ComputeError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Check that ceilings and thresholds are usable
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.khd_max_ms <= 0 {
            return Err(ComputeError::ConfigError(format!(
                "khd_max_ms must be positive, got {}",
                self.khd_max_ms
            )));
        }
        if self.iki_max_ms <= 0 {
            return Err(ComputeError::ConfigError(format!(
                "iki_max_ms must be positive, got {}",
                self.iki_max_ms
            )));
        }
        if self.pause_short_ms <= 0 || self.pause_long_ms <= 0 {
            return Err(ComputeError::ConfigError(
                "pause thresholds must be positive".to_string(),
            ));
        }
        if self.pause_short_ms > self.pause_long_ms {
            return Err(ComputeError::ConfigError(format!(
                "pause_short_ms ({}) exceeds pause_long_ms ({})",
                self.pause_short_ms, self.pause_long_ms
            )));
        }
        if self.backspace_key.is_empty() {
            return Err(ComputeError::ConfigError(
                "backspace_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
