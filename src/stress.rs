//! Self-reported stress and workload
//!
//! Reads the per-test questionnaire export and joins it onto the metrics table
//! on (session_id, test_type).

use crate::error::ComputeError;
use crate::schema::{normalize_column, TestType, COL_SESSION_ID, COL_TEST_TYPE};
use crate::types::MetricsRow;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const COL_STRESS_LEVEL: &str = "stress_level";
const COL_MENTAL_DEMAND: &str = "mental_demand";
/// Matched as a substring: exports name these `rushed_feeling`, `concentration_difficulty`, ...
const RUSHED_MARKER: &str = "rushed";
const CONCENTRATION_MARKER: &str = "concentration";

/// Questionnaire outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    StressLevel,
    MentalDemand,
    Rushed,
    Concentration,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::StressLevel,
        Outcome::MentalDemand,
        Outcome::Rushed,
        Outcome::Concentration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::StressLevel => "stress_level",
            Outcome::MentalDemand => "mental_demand",
            Outcome::Rushed => "rushed",
            Outcome::Concentration => "concentration",
        }
    }
}

/// Scores from one questionnaire submission; unanswered items are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressScores {
    pub stress_level: Option<f64>,
    pub mental_demand: Option<f64>,
    pub rushed: Option<f64>,
    pub concentration: Option<f64>,
}

impl StressScores {
    pub fn get(&self, outcome: Outcome) -> Option<f64> {
        match outcome {
            Outcome::StressLevel => self.stress_level,
            Outcome::MentalDemand => self.mental_demand,
            Outcome::Rushed => self.rushed,
            Outcome::Concentration => self.concentration,
        }
    }
}

/// One questionnaire submission for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressRecord {
    pub session_id: String,
    pub test_type: TestType,
    #[serde(flatten)]
    pub scores: StressScores,
}

/// A metrics row with the scores reported for its test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    #[serde(flatten)]
    pub row: MetricsRow,
    #[serde(flatten)]
    pub scores: StressScores,
}

/// Parse a stress/workload CSV export.
///
/// `session_id` and `test_type` columns are required. Score columns are
/// optional; cells that are empty or not numeric are treated as unanswered.
/// Rows without a session or test cannot be joined and are skipped.
pub fn parse_stress_csv(csv_text: &str) -> Result<Vec<StressRecord>, ComputeError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_column).collect();
    let find = |name: &str| headers.iter().position(|h| h == name);
    let find_containing = |marker: &str| headers.iter().position(|h| h.contains(marker));

    let session_idx =
        find(COL_SESSION_ID).ok_or_else(|| ComputeError::MissingColumn(COL_SESSION_ID.into()))?;
    let test_idx =
        find(COL_TEST_TYPE).ok_or_else(|| ComputeError::MissingColumn(COL_TEST_TYPE.into()))?;
    let stress_idx = find(COL_STRESS_LEVEL);
    let demand_idx = find(COL_MENTAL_DEMAND);
    let rushed_idx = find_containing(RUSHED_MARKER);
    let concentration_idx = find_containing(CONCENTRATION_MARKER);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let text = |idx: usize| record.get(idx).filter(|value| !value.is_empty());
        let score = |idx: Option<usize>| idx.and_then(|i| parse_score(text(i)?, row));

        let (Some(session_id), Some(test_type)) = (text(session_idx), text(test_idx)) else {
            warn!("Stress row {row}: missing session_id or test_type, skipped");
            continue;
        };

        records.push(StressRecord {
            session_id: session_id.to_string(),
            test_type: TestType::parse(test_type),
            scores: StressScores {
                stress_level: score(stress_idx),
                mental_demand: score(demand_idx),
                rushed: score(rushed_idx),
                concentration: score(concentration_idx),
            },
        });
    }

    info!("Parsed {} stress rows", records.len());
    Ok(records)
}

fn parse_score(value: &str, row: usize) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(score) if score.is_finite() => Some(score),
        _ => {
            warn!("Stress row {row}: non-numeric score '{value}' treated as unanswered");
            None
        }
    }
}

/// Left-join stress scores onto metrics rows.
///
/// Every metrics row appears at least once. A test with several submissions
/// yields one merged row per submission. Overall rows never match.
pub fn merge_stress(metrics: &[MetricsRow], stress: &[StressRecord]) -> Vec<MergedRow> {
    let mut by_test: HashMap<(&str, &TestType), Vec<&StressScores>> = HashMap::new();
    for record in stress {
        by_test
            .entry((record.session_id.as_str(), &record.test_type))
            .or_default()
            .push(&record.scores);
    }

    let mut merged = Vec::with_capacity(metrics.len());
    for row in metrics {
        let matches = if row.test_type.is_overall() {
            None
        } else {
            by_test.get(&(row.session_id.as_str(), &row.test_type))
        };

        match matches {
            Some(submissions) => {
                if submissions.len() > 1 {
                    warn!(
                        "{} stress submissions for session {} test {}",
                        submissions.len(),
                        row.session_id,
                        row.test_type
                    );
                }
                merged.extend(submissions.iter().map(|scores| MergedRow {
                    row: row.clone(),
                    scores: (*scores).clone(),
                }));
            }
            None => merged.push(MergedRow {
                row: row.clone(),
                scores: StressScores::default(),
            }),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupMetrics;
    use pretty_assertions::assert_eq;

    fn metrics_row(session: &str, test: TestType) -> MetricsRow {
        MetricsRow {
            session_id: session.to_string(),
            test_type: test,
            metrics: GroupMetrics {
                n_events: 2,
                n_keydowns: 1,
                duration_sec: 0.1,
                mean_khd_ms: Some(100.0),
                sd_khd_ms: None,
                cv_khd: None,
                mean_iki_ms: None,
                sd_iki_ms: None,
                cv_iki: None,
                pause_count_200ms: 0,
                pause_count_500ms: 0,
                backspace_count: 0,
                backspace_rate: 0.0,
                cpm: Some(600.0),
            },
        }
    }

    #[test]
    fn test_parse_stress_csv_matches_columns() {
        let csv = "Session_ID, Test_Type ,Stress_Level,mental_demand,rushed_feeling,concentration_difficulty\n\
                   s1,free,3,4,2,5\n\
                   s1,timed,,6,abc,1\n";
        let records = parse_stress_csv(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].test_type, TestType::Free);
        assert_eq!(
            records[0].scores,
            StressScores {
                stress_level: Some(3.0),
                mental_demand: Some(4.0),
                rushed: Some(2.0),
                concentration: Some(5.0),
            }
        );
        assert_eq!(records[1].scores.stress_level, None);
        assert_eq!(records[1].scores.rushed, None);
        assert_eq!(records[1].scores.concentration, Some(1.0));
    }

    #[test]
    fn test_parse_stress_csv_optional_scores() {
        let records = parse_stress_csv("session_id,test_type,stress_level\ns1,free,2\n").unwrap();
        assert_eq!(records[0].scores.stress_level, Some(2.0));
        assert_eq!(records[0].scores.concentration, None);
    }

    #[test]
    fn test_parse_stress_csv_missing_column() {
        let err = parse_stress_csv("session_id,stress_level\ns1,2\n").unwrap_err();
        assert!(matches!(err, ComputeError::MissingColumn(ref c) if c == "test_type"));
    }

    #[test]
    fn test_parse_stress_csv_skips_unkeyed_rows() {
        let records = parse_stress_csv("session_id,test_type,stress_level\n,free,2\ns2,timed,1\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, "s2");
    }

    #[test]
    fn test_merge_left_join() {
        let metrics = vec![
            metrics_row("s1", TestType::Free),
            metrics_row("s1", TestType::Timed),
            metrics_row("s1", TestType::Overall),
        ];
        let stress = vec![
            StressRecord {
                session_id: "s1".to_string(),
                test_type: TestType::Free,
                scores: StressScores {
                    stress_level: Some(3.0),
                    ..StressScores::default()
                },
            },
            StressRecord {
                session_id: "s9".to_string(),
                test_type: TestType::Free,
                scores: StressScores::default(),
            },
        ];

        let merged = merge_stress(&metrics, &stress);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].scores.stress_level, Some(3.0));
        assert_eq!(merged[1].scores, StressScores::default());
        assert!(merged[2].row.test_type.is_overall());
        assert_eq!(merged[2].scores, StressScores::default());
    }

    #[test]
    fn test_merge_keeps_duplicate_submissions() {
        let metrics = vec![metrics_row("s1", TestType::Timed)];
        let submission = |level: f64| StressRecord {
            session_id: "s1".to_string(),
            test_type: TestType::Timed,
            scores: StressScores {
                stress_level: Some(level),
                ..StressScores::default()
            },
        };
        let merged = merge_stress(&metrics, &[submission(2.0), submission(4.0)]);
        let levels: Vec<Option<f64>> = merged.iter().map(|m| m.scores.stress_level).collect();
        assert_eq!(levels, vec![Some(2.0), Some(4.0)]);
    }

    #[test]
    fn test_overall_never_matches() {
        let metrics = vec![metrics_row("s1", TestType::Overall)];
        let stress = vec![StressRecord {
            session_id: "s1".to_string(),
            test_type: TestType::Overall,
            scores: StressScores {
                stress_level: Some(5.0),
                ..StressScores::default()
            },
        }];
        let merged = merge_stress(&metrics, &stress);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].scores.stress_level, None);
    }

    #[test]
    fn test_merged_row_serializes_flat() {
        let merged = MergedRow {
            row: metrics_row("s1", TestType::Free),
            scores: StressScores {
                rushed: Some(1.0),
                ..StressScores::default()
            },
        };
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["session_id"], "s1");
        assert_eq!(value["rushed"], 1.0);
        assert_eq!(value["cpm"], 600.0);
    }
}
