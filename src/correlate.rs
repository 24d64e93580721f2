//! Association between typing metrics and self-reported stress
//!
//! Pearson correlations over per-test merged rows. Overall rows are excluded
//! since questionnaires are answered per test.

use crate::stats::pearson;
use crate::stress::{MergedRow, Outcome};
use crate::types::{Metric, MetricSource};
use log::debug;
use serde::{Deserialize, Serialize};

/// Typing metrics tested against every outcome
pub const PREDICTORS: [Metric; 9] = [
    Metric::MeanIkiMs,
    Metric::SdIkiMs,
    Metric::MeanKhdMs,
    Metric::SdKhdMs,
    Metric::CvIki,
    Metric::CvKhd,
    Metric::PauseCount500ms,
    Metric::BackspaceRate,
    Metric::Cpm,
];

/// Correlation of one predictor with one outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub outcome: Outcome,
    pub predictor: Metric,
    /// Pearson r, absent with fewer than 3 complete pairs or a constant series
    pub r: Option<f64>,
    /// Two-sided p-value
    pub p_value: Option<f64>,
    /// Rows where both values are present
    pub n: usize,
}

/// Correlate every predictor with every outcome, outcome-major
pub fn correlate(merged: &[MergedRow]) -> Vec<CorrelationRow> {
    correlate_with(merged, &PREDICTORS, &Outcome::ALL)
}

/// Correlate a chosen set of predictors and outcomes
pub fn correlate_with(
    merged: &[MergedRow],
    predictors: &[Metric],
    outcomes: &[Outcome],
) -> Vec<CorrelationRow> {
    let per_test: Vec<&MergedRow> = merged
        .iter()
        .filter(|m| !m.row.test_type.is_overall())
        .collect();
    debug!("correlating over {} per-test rows", per_test.len());

    let mut rows = Vec::with_capacity(predictors.len() * outcomes.len());
    for &outcome in outcomes {
        for &predictor in predictors {
            let pairs: Vec<(f64, f64)> = per_test
                .iter()
                .filter_map(|m| Some((m.row.metric(predictor)?, m.scores.get(outcome)?)))
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect();

            let correlation = pearson(&pairs);
            rows.push(CorrelationRow {
                outcome,
                predictor,
                r: correlation.map(|c| c.r),
                p_value: correlation.map(|c| c.p_value),
                n: pairs.len(),
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TestType;
    use crate::stress::StressScores;
    use crate::types::{GroupMetrics, MetricsRow};

    fn merged(test: TestType, cpm: Option<f64>, stress_level: Option<f64>) -> MergedRow {
        MergedRow {
            row: MetricsRow {
                session_id: "s1".to_string(),
                test_type: test,
                metrics: GroupMetrics {
                    n_events: 10,
                    n_keydowns: 5,
                    duration_sec: 2.0,
                    mean_khd_ms: None,
                    sd_khd_ms: None,
                    cv_khd: None,
                    mean_iki_ms: None,
                    sd_iki_ms: None,
                    cv_iki: None,
                    pause_count_200ms: 0,
                    pause_count_500ms: 0,
                    backspace_count: 0,
                    backspace_rate: 0.0,
                    cpm,
                },
            },
            scores: StressScores {
                stress_level,
                ..StressScores::default()
            },
        }
    }

    fn find(rows: &[CorrelationRow], outcome: Outcome, predictor: Metric) -> &CorrelationRow {
        rows.iter()
            .find(|r| r.outcome == outcome && r.predictor == predictor)
            .unwrap()
    }

    #[test]
    fn test_negative_association() {
        let data = vec![
            merged(TestType::Free, Some(300.0), Some(1.0)),
            merged(TestType::Timed, Some(250.0), Some(2.0)),
            merged(TestType::Multitasking, Some(200.0), Some(3.0)),
            merged(TestType::Free, Some(150.0), Some(4.0)),
        ];
        let rows = correlate(&data);
        assert_eq!(rows.len(), PREDICTORS.len() * Outcome::ALL.len());

        let cpm = find(&rows, Outcome::StressLevel, Metric::Cpm);
        assert_eq!(cpm.n, 4);
        assert!((cpm.r.unwrap() + 1.0).abs() < 1e-12);
        assert!(cpm.p_value.unwrap() < 1e-6);
    }

    #[test]
    fn test_overall_rows_excluded() {
        let data = vec![
            merged(TestType::Free, Some(300.0), Some(1.0)),
            merged(TestType::Timed, Some(250.0), Some(2.0)),
            merged(TestType::Overall, Some(200.0), Some(3.0)),
        ];
        let cpm = find(&correlate(&data), Outcome::StressLevel, Metric::Cpm).clone();
        assert_eq!(cpm.n, 2);
        assert_eq!(cpm.r, None);
        assert_eq!(cpm.p_value, None);
    }

    #[test]
    fn test_pairwise_complete() {
        let data = vec![
            merged(TestType::Free, Some(300.0), Some(1.0)),
            merged(TestType::Timed, None, Some(2.0)),
            merged(TestType::Free, Some(200.0), None),
            merged(TestType::Timed, Some(100.0), Some(5.0)),
            merged(TestType::Free, Some(150.0), Some(3.0)),
        ];
        let cpm = find(&correlate(&data), Outcome::StressLevel, Metric::Cpm).clone();
        assert_eq!(cpm.n, 3);
        assert!(cpm.r.unwrap() < 0.0);
    }

    #[test]
    fn test_constant_predictor_has_no_r() {
        let data = vec![
            merged(TestType::Free, Some(300.0), Some(1.0)),
            merged(TestType::Timed, Some(250.0), Some(2.0)),
            merged(TestType::Free, Some(200.0), Some(3.0)),
        ];
        // backspace_rate is 0 in every row.
        let rate = find(&correlate(&data), Outcome::StressLevel, Metric::BackspaceRate).clone();
        assert_eq!(rate.n, 3);
        assert_eq!(rate.r, None);
    }

    #[test]
    fn test_missing_outcome_has_no_pairs() {
        let data = vec![merged(TestType::Free, Some(300.0), Some(1.0))];
        let rushed = find(&correlate(&data), Outcome::Rushed, Metric::Cpm).clone();
        assert_eq!(rushed.n, 0);
        assert_eq!(rushed.r, None);
    }
}
