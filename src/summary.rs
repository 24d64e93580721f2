//! Distribution summaries across sessions
//!
//! For each test type (and each field within a test type), reports the 10th
//! percentile, mean and 90th percentile of every numeric metric over the rows
//! where it is present.

use crate::schema::TestType;
use crate::stats::{mean, quantile};
use crate::types::{FieldMetricsRow, Metric, MetricSource, MetricsRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics summarized per test type
pub const TEST_SUMMARY_METRICS: [Metric; 12] = [
    Metric::MeanKhdMs,
    Metric::SdKhdMs,
    Metric::CvKhd,
    Metric::MeanIkiMs,
    Metric::SdIkiMs,
    Metric::CvIki,
    Metric::PauseCount200ms,
    Metric::PauseCount500ms,
    Metric::BackspaceRate,
    Metric::Cpm,
    Metric::DurationSec,
    Metric::NKeydowns,
];

/// Metrics summarized per field
pub const FIELD_SUMMARY_METRICS: [Metric; 11] = [
    Metric::MeanKhdMs,
    Metric::SdKhdMs,
    Metric::CvKhd,
    Metric::MeanIkiMs,
    Metric::SdIkiMs,
    Metric::CvIki,
    Metric::PauseCount200ms,
    Metric::PauseCount500ms,
    Metric::BackspaceRate,
    Metric::Cpm,
    Metric::FirstKeyLatencyMs,
];

/// Spread of one metric over a set of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub p10: f64,
    pub mean: f64,
    pub p90: f64,
    /// Rows where the metric is present
    pub n_rows: usize,
}

/// Summary of all rows sharing a test type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub test_type: TestType,
    pub n_rows: usize,
    pub metrics: Vec<MetricSummary>,
}

/// Summary of all rows sharing a (test type, field)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub test_type: TestType,
    pub field_name: String,
    pub n_rows: usize,
    pub metrics: Vec<MetricSummary>,
}

/// Summaries per test type over the metrics table, overall rows included
pub fn summarize_by_test(rows: &[MetricsRow]) -> Vec<TestSummary> {
    let mut groups: BTreeMap<&TestType, Vec<&MetricsRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(&row.test_type).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(test_type, group)| TestSummary {
            test_type: test_type.clone(),
            n_rows: group.len(),
            metrics: summarize_metrics(&group, &TEST_SUMMARY_METRICS),
        })
        .collect()
}

/// Summaries per (test type, field) over the per-field table
pub fn summarize_by_field(rows: &[FieldMetricsRow]) -> Vec<FieldSummary> {
    let mut groups: BTreeMap<(&TestType, &str), Vec<&FieldMetricsRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((&row.test_type, row.field_name.as_str()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((test_type, field_name), group)| FieldSummary {
            test_type: test_type.clone(),
            field_name: field_name.to_string(),
            n_rows: group.len(),
            metrics: summarize_metrics(&group, &FIELD_SUMMARY_METRICS),
        })
        .collect()
}

/// Summarize each metric over the rows where it is present, skipping metrics
/// that are absent everywhere
fn summarize_metrics<R: MetricSource>(rows: &[&R], metrics: &[Metric]) -> Vec<MetricSummary> {
    metrics
        .iter()
        .filter_map(|&metric| {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|row| row.metric(metric))
                .filter(|v| v.is_finite())
                .collect();
            Some(MetricSummary {
                metric,
                p10: quantile(&values, 0.10)?,
                mean: mean(&values)?,
                p90: quantile(&values, 0.90)?,
                n_rows: values.len(),
            })
        })
        .collect()
}
