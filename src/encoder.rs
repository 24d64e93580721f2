//! Report encoding
//!
//! Encodes the metrics tables as a JSON report with producer metadata, as CSV
//! tables, or as NDJSON rows.

use crate::config::MetricsConfig;
use crate::error::ComputeError;
use crate::types::{FieldMetricsRow, GroupMetrics, MetricsRow, RollupTables};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Metric columns shared by both tables, in output order
pub const METRIC_COLUMNS: [&str; 14] = [
    "n_events",
    "n_keydowns",
    "duration_sec",
    "mean_khd_ms",
    "sd_khd_ms",
    "cv_khd",
    "mean_iki_ms",
    "sd_iki_ms",
    "cv_iki",
    "pause_count_200ms",
    "pause_count_500ms",
    "backspace_count",
    "backspace_rate",
    "cpm",
];

/// Who computed a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Full result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    /// Configuration the tables were computed with
    pub config: MetricsConfig,
    pub metrics: Vec<MetricsRow>,
    pub field_metrics: Vec<FieldMetricsRow>,
}

/// Report encoder
pub struct MetricsEncoder {
    instance_id: String,
}

impl Default for MetricsEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap computed tables into a report
    pub fn encode(&self, tables: RollupTables, config: &MetricsConfig) -> MetricsReport {
        MetricsReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            config: config.clone(),
            metrics: tables.metrics,
            field_metrics: tables.field_metrics,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        tables: RollupTables,
        config: &MetricsConfig,
    ) -> Result<String, ComputeError> {
        let report = self.encode(tables, config);
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}

/// A row that can be written as one CSV record
pub trait TableRow {
    fn header() -> Vec<&'static str>;
    fn cells(&self) -> Vec<String>;
}

impl TableRow for MetricsRow {
    fn header() -> Vec<&'static str> {
        let mut header = vec!["session_id", "test_type"];
        header.extend(METRIC_COLUMNS);
        header
    }

    fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.session_id.clone(), self.test_type.to_string()];
        cells.extend(metric_cells(&self.metrics));
        cells
    }
}

impl TableRow for FieldMetricsRow {
    fn header() -> Vec<&'static str> {
        let mut header = vec!["session_id", "test_type", "field_name"];
        header.extend(METRIC_COLUMNS);
        header.push("first_key_latency_ms");
        header
    }

    fn cells(&self) -> Vec<String> {
        let mut cells = vec![
            self.session_id.clone(),
            self.test_type.to_string(),
            self.field_name.clone(),
        ];
        cells.extend(metric_cells(&self.metrics));
        cells.push(self.first_key_latency_ms.to_string());
        cells
    }
}

fn metric_cells(m: &GroupMetrics) -> Vec<String> {
    vec![
        m.n_events.to_string(),
        m.n_keydowns.to_string(),
        m.duration_sec.to_string(),
        optional_cell(m.mean_khd_ms),
        optional_cell(m.sd_khd_ms),
        optional_cell(m.cv_khd),
        optional_cell(m.mean_iki_ms),
        optional_cell(m.sd_iki_ms),
        optional_cell(m.cv_iki),
        m.pause_count_200ms.to_string(),
        m.pause_count_500ms.to_string(),
        m.backspace_count.to_string(),
        m.backspace_rate.to_string(),
        optional_cell(m.cpm),
    ]
}

/// Absent values are empty cells
fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write rows as CSV with a header line
pub fn to_csv<R: TableRow>(rows: &[R]) -> Result<String, ComputeError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(R::header())?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ComputeError::EncodingError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ComputeError::EncodingError(e.to_string()))
}

/// Write rows as newline-delimited JSON
pub fn to_ndjson<R: Serialize>(rows: &[R]) -> Result<String, ComputeError> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TestType;
    use pretty_assertions::assert_eq;

    fn sample_metrics() -> GroupMetrics {
        GroupMetrics {
            n_events: 3,
            n_keydowns: 2,
            duration_sec: 0.08,
            mean_khd_ms: Some(50.0),
            sd_khd_ms: None,
            cv_khd: None,
            mean_iki_ms: Some(30.0),
            sd_iki_ms: None,
            cv_iki: None,
            pause_count_200ms: 0,
            pause_count_500ms: 0,
            backspace_count: 0,
            backspace_rate: 0.0,
            cpm: Some(1500.0),
        }
    }

    fn sample_tables() -> RollupTables {
        RollupTables {
            metrics: vec![MetricsRow {
                session_id: "s1".to_string(),
                test_type: TestType::Free,
                metrics: sample_metrics(),
            }],
            field_metrics: vec![FieldMetricsRow {
                session_id: "s1".to_string(),
                test_type: TestType::Free,
                field_name: "q1".to_string(),
                metrics: sample_metrics(),
                first_key_latency_ms: 250,
            }],
        }
    }

    #[test]
    fn test_encode_report() {
        let encoder = MetricsEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(sample_tables(), &MetricsConfig::default());

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.metrics.len(), 1);
        assert_eq!(report.field_metrics.len(), 1);
        assert_eq!(report.config, MetricsConfig::default());
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = MetricsEncoder::new();
        let json = encoder
            .encode_to_json(sample_tables(), &MetricsConfig::default())
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["metrics"][0]["test_type"], "free");
        assert!(parsed["metrics"][0]["sd_khd_ms"].is_null());
        assert_eq!(parsed["field_metrics"][0]["first_key_latency_ms"], 250);
        assert_eq!(parsed["config"]["khd_max_ms"], 2000);

        // Round-trips into the typed report
        let report: MetricsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.metrics, sample_tables().metrics);
    }

    #[test]
    fn test_metrics_csv() {
        let csv = to_csv(&sample_tables().metrics).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "session_id,test_type,n_events,n_keydowns,duration_sec,mean_khd_ms,sd_khd_ms,cv_khd,\
             mean_iki_ms,sd_iki_ms,cv_iki,pause_count_200ms,pause_count_500ms,backspace_count,\
             backspace_rate,cpm"
        );
        assert_eq!(lines.next().unwrap(), "s1,free,3,2,0.08,50,,,30,,,0,0,0,0,1500");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_field_csv_has_latency_column() {
        let csv = to_csv(&sample_tables().field_metrics).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("session_id,test_type,field_name,n_events"));
        assert!(header.ends_with(",cpm,first_key_latency_ms"));
        assert!(lines.next().unwrap().ends_with(",1500,250"));
    }

    #[test]
    fn test_empty_table_csv_is_header_only() {
        let csv = to_csv::<MetricsRow>(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_ndjson_one_object_per_line() {
        let tables = sample_tables();
        let rows = vec![tables.metrics[0].clone(), tables.metrics[0].clone()];
        let ndjson = to_ndjson(&rows).unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["cpm"], 1500.0);
    }
}
