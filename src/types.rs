//! Core data types for keystroke metrics
//!
//! This module defines the paired samples produced by the pairer, the per-group
//! statistics produced by the aggregator, and the rows of the two result tables.

use crate::schema::TestType;
use serde::{Deserialize, Serialize};

// ============================================================================
// Paired samples
// ============================================================================

/// Time between pressing and releasing one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHoldDuration {
    /// Key identifier
    pub key: String,
    /// Hold duration in milliseconds, strictly positive
    pub duration_ms: i64,
}

/// Time between releasing one key and pressing the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterKeyInterval {
    /// Gap in milliseconds, strictly positive
    pub gap_ms: i64,
}

// ============================================================================
// Aggregated metrics
// ============================================================================

/// Summary statistics for one group of events.
///
/// Counts and `duration_sec` are always defined. Statistical fields are `None`
/// when there is no data to compute them from; they are never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    /// Number of events of any type
    pub n_events: u32,
    /// Number of keydown events
    pub n_keydowns: u32,
    /// Span between first and last event in seconds (0 with fewer than 2 events)
    pub duration_sec: f64,
    /// Mean key-hold duration
    pub mean_khd_ms: Option<f64>,
    /// Standard deviation of key-hold durations
    pub sd_khd_ms: Option<f64>,
    /// Coefficient of variation of key-hold durations
    pub cv_khd: Option<f64>,
    /// Mean inter-key interval
    pub mean_iki_ms: Option<f64>,
    /// Standard deviation of inter-key intervals
    pub sd_iki_ms: Option<f64>,
    /// Coefficient of variation of inter-key intervals
    pub cv_iki: Option<f64>,
    /// Intervals above the short pause threshold (200ms by default)
    pub pause_count_200ms: u32,
    /// Intervals above the long pause threshold (500ms by default)
    pub pause_count_500ms: u32,
    /// Keydowns of the delete key
    pub backspace_count: u32,
    /// backspace_count / n_keydowns, 0 when there are no keydowns
    pub backspace_rate: f64,
    /// Corrected characters per minute
    pub cpm: Option<f64>,
}

/// One row of the metrics table: per (session, test) or per session "overall"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub session_id: String,
    pub test_type: TestType,
    #[serde(flatten)]
    pub metrics: GroupMetrics,
}

/// One row of the per-field metrics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetricsRow {
    pub session_id: String,
    pub test_type: TestType,
    pub field_name: String,
    #[serde(flatten)]
    pub metrics: GroupMetrics,
    /// First event of the field relative to the first event of the test
    pub first_key_latency_ms: i64,
}

/// Both result tables of one analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupTables {
    /// Per-test rows followed by per-session overall rows
    pub metrics: Vec<MetricsRow>,
    /// Per-field rows
    pub field_metrics: Vec<FieldMetricsRow>,
}

// ============================================================================
// Named metric access
// ============================================================================

/// Numeric metrics addressable by name, for correlation and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    NEvents,
    NKeydowns,
    DurationSec,
    MeanKhdMs,
    SdKhdMs,
    CvKhd,
    MeanIkiMs,
    SdIkiMs,
    CvIki,
    #[serde(rename = "pause_count_200ms")]
    PauseCount200ms,
    #[serde(rename = "pause_count_500ms")]
    PauseCount500ms,
    BackspaceCount,
    BackspaceRate,
    Cpm,
    FirstKeyLatencyMs,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::NEvents => "n_events",
            Metric::NKeydowns => "n_keydowns",
            Metric::DurationSec => "duration_sec",
            Metric::MeanKhdMs => "mean_khd_ms",
            Metric::SdKhdMs => "sd_khd_ms",
            Metric::CvKhd => "cv_khd",
            Metric::MeanIkiMs => "mean_iki_ms",
            Metric::SdIkiMs => "sd_iki_ms",
            Metric::CvIki => "cv_iki",
            Metric::PauseCount200ms => "pause_count_200ms",
            Metric::PauseCount500ms => "pause_count_500ms",
            Metric::BackspaceCount => "backspace_count",
            Metric::BackspaceRate => "backspace_rate",
            Metric::Cpm => "cpm",
            Metric::FirstKeyLatencyMs => "first_key_latency_ms",
        }
    }
}

/// Rows that expose their metrics by name
pub trait MetricSource {
    fn metric(&self, metric: Metric) -> Option<f64>;
}

impl MetricSource for GroupMetrics {
    fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::NEvents => Some(self.n_events as f64),
            Metric::NKeydowns => Some(self.n_keydowns as f64),
            Metric::DurationSec => Some(self.duration_sec),
            Metric::MeanKhdMs => self.mean_khd_ms,
            Metric::SdKhdMs => self.sd_khd_ms,
            Metric::CvKhd => self.cv_khd,
            Metric::MeanIkiMs => self.mean_iki_ms,
            Metric::SdIkiMs => self.sd_iki_ms,
            Metric::CvIki => self.cv_iki,
            Metric::PauseCount200ms => Some(self.pause_count_200ms as f64),
            Metric::PauseCount500ms => Some(self.pause_count_500ms as f64),
            Metric::BackspaceCount => Some(self.backspace_count as f64),
            Metric::BackspaceRate => Some(self.backspace_rate),
            Metric::Cpm => self.cpm,
            Metric::FirstKeyLatencyMs => None,
        }
    }
}

impl MetricSource for MetricsRow {
    fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.metric(metric)
    }
}

impl MetricSource for FieldMetricsRow {
    fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::FirstKeyLatencyMs => Some(self.first_key_latency_ms as f64),
            other => self.metrics.metric(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> GroupMetrics {
        GroupMetrics {
            n_events: 4,
            n_keydowns: 2,
            duration_sec: 0.3,
            mean_khd_ms: Some(95.0),
            sd_khd_ms: None,
            cv_khd: None,
            mean_iki_ms: Some(30.0),
            sd_iki_ms: None,
            cv_iki: None,
            pause_count_200ms: 0,
            pause_count_500ms: 0,
            backspace_count: 0,
            backspace_rate: 0.0,
            cpm: Some(400.0),
        }
    }

    #[test]
    fn test_metrics_row_flattens() {
        let row = MetricsRow {
            session_id: "s1".to_string(),
            test_type: TestType::Overall,
            metrics: sample_metrics(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["test_type"], "overall");
        assert_eq!(value["n_events"], 4);
        assert!(value["sd_khd_ms"].is_null());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(Metric::PauseCount500ms.as_str(), "pause_count_500ms");
        let json = serde_json::to_string(&Metric::MeanIkiMs).unwrap();
        assert_eq!(json, "\"mean_iki_ms\"");
    }

    #[test]
    fn test_field_row_exposes_latency() {
        let row = FieldMetricsRow {
            session_id: "s1".to_string(),
            test_type: TestType::Free,
            field_name: "q1".to_string(),
            metrics: sample_metrics(),
            first_key_latency_ms: 1200,
        };
        assert_eq!(row.metric(Metric::FirstKeyLatencyMs), Some(1200.0));
        assert_eq!(row.metric(Metric::Cpm), Some(400.0));
        assert_eq!(row.metrics.metric(Metric::FirstKeyLatencyMs), None);
    }
}
