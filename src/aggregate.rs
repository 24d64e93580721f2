//! Keystroke metric aggregation
//!
//! Rolls one group's events and paired samples into [`GroupMetrics`]. Counts and
//! durations are always defined; means, dispersions, ratios over samples and
//! typing speed stay absent when the group has nothing to compute them from.

use crate::config::MetricsConfig;
use crate::schema::KeyEvent;
use crate::stats::{coefficient_of_variation, mean, std_dev};
use crate::types::{GroupMetrics, InterKeyInterval, KeyHoldDuration};
use std::borrow::Borrow;

/// Aggregator for one group of keystroke events
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Compute the summary statistics of one group.
    ///
    /// `holds` and `intervals` must come from pairing the same `events`.
    pub fn aggregate<E: Borrow<KeyEvent>>(
        events: &[E],
        holds: &[KeyHoldDuration],
        intervals: &[InterKeyInterval],
        config: &MetricsConfig,
    ) -> GroupMetrics {
        let n_events = events.len() as u32;
        let n_keydowns = events
            .iter()
            .map(Borrow::<KeyEvent>::borrow)
            .filter(|e| e.is_keydown())
            .count() as u32;
        let backspace_count = count_backspaces(events, &config.backspace_key);

        let duration_sec = time_span_ms(events) as f64 / 1000.0;

        let khd: Vec<f64> = holds.iter().map(|h| h.duration_ms as f64).collect();
        let iki: Vec<f64> = intervals.iter().map(|i| i.gap_ms as f64).collect();

        let mean_khd_ms = mean(&khd);
        let sd_khd_ms = std_dev(&khd, config.sd_kind);
        let mean_iki_ms = mean(&iki);
        let sd_iki_ms = std_dev(&iki, config.sd_kind);

        GroupMetrics {
            n_events,
            n_keydowns,
            duration_sec,
            mean_khd_ms,
            sd_khd_ms,
            cv_khd: coefficient_of_variation(mean_khd_ms, sd_khd_ms),
            mean_iki_ms,
            sd_iki_ms,
            cv_iki: coefficient_of_variation(mean_iki_ms, sd_iki_ms),
            pause_count_200ms: count_pauses(intervals, config.pause_short_ms),
            pause_count_500ms: count_pauses(intervals, config.pause_long_ms),
            backspace_count,
            backspace_rate: compute_backspace_rate(backspace_count, n_keydowns),
            cpm: compute_cpm(n_keydowns, backspace_count, duration_sec),
        }
    }
}

/// Milliseconds between the earliest and latest event, 0 with fewer than 2 events
pub fn time_span_ms<E: Borrow<KeyEvent>>(events: &[E]) -> i64 {
    if events.len() < 2 {
        return 0;
    }
    match (earliest_ms(events), latest_ms(events)) {
        (Some(first), Some(last)) => last - first,
        _ => 0,
    }
}

/// Earliest event time of a group
pub fn earliest_ms<E: Borrow<KeyEvent>>(events: &[E]) -> Option<i64> {
    events
        .iter()
        .map(|e| Borrow::<KeyEvent>::borrow(e).pressed_at_ms())
        .min()
}

fn latest_ms<E: Borrow<KeyEvent>>(events: &[E]) -> Option<i64> {
    events
        .iter()
        .map(|e| Borrow::<KeyEvent>::borrow(e).pressed_at_ms())
        .max()
}

/// How long after the test's first event this group's first event came.
///
/// Not clamped: a negative value means field events precede the recorded test
/// start and is reported as is.
pub fn first_key_latency_ms<E: Borrow<KeyEvent>>(events: &[E], test_start_ms: i64) -> Option<i64> {
    earliest_ms(events).map(|first| first - test_start_ms)
}

fn count_backspaces<E: Borrow<KeyEvent>>(events: &[E], backspace_key: &str) -> u32 {
    events
        .iter()
        .map(Borrow::<KeyEvent>::borrow)
        .filter(|e| e.is_keydown() && e.key == backspace_key)
        .count() as u32
}

/// Intervals strictly above `threshold_ms`
fn count_pauses(intervals: &[InterKeyInterval], threshold_ms: i64) -> u32 {
    intervals.iter().filter(|i| i.gap_ms > threshold_ms).count() as u32
}

/// Share of keydowns that were corrections; 0 rather than absent without keydowns
fn compute_backspace_rate(backspace_count: u32, n_keydowns: u32) -> f64 {
    if n_keydowns == 0 {
        return 0.0;
    }
    backspace_count as f64 / n_keydowns as f64
}

/// Corrected characters per minute, absent for a zero-length group
fn compute_cpm(n_keydowns: u32, backspace_count: u32, duration_sec: f64) -> Option<f64> {
    if duration_sec <= 0.0 {
        return None;
    }
    let corrected = n_keydowns as f64 - backspace_count as f64;
    Some(corrected / (duration_sec / 60.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StdDevKind;
    use crate::pairing::test_support::{down, up};
    use crate::pairing::{pair_hold_durations, pair_inter_key_intervals};

    fn run(events: &[KeyEvent], config: &MetricsConfig) -> GroupMetrics {
        let holds = pair_hold_durations(events, config);
        let intervals = pair_inter_key_intervals(events, config);
        MetricsAggregator::aggregate(events, &holds, &intervals, config)
    }

    fn run_default(events: &[KeyEvent]) -> GroupMetrics {
        run(events, &MetricsConfig::default())
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be present");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_single_hold_mean() {
        let metrics = run_default(&[down("a", 0), up("a", 100)]);
        assert_close(metrics.mean_khd_ms, 100.0);
        assert_eq!(metrics.n_events, 2);
        assert_eq!(metrics.n_keydowns, 1);
        assert!((metrics.duration_sec - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_borrowed_and_owned_events_agree() {
        let config = MetricsConfig::default();
        let owned = vec![down("a", 0), up("a", 90), down("Backspace", 300), up("Backspace", 380)];
        let borrowed: Vec<&KeyEvent> = owned.iter().collect();
        let holds = pair_hold_durations(&borrowed, &config);
        let intervals = pair_inter_key_intervals(&borrowed, &config);

        let from_refs = MetricsAggregator::aggregate(&borrowed, &holds, &intervals, &config);
        assert_eq!(from_refs, run(&owned, &config));
        assert_eq!(from_refs.n_keydowns, 2);
        assert_eq!(from_refs.backspace_count, 1);
        assert_eq!(earliest_ms(&borrowed), earliest_ms(&owned));
        assert_eq!(time_span_ms(&borrowed), 380);
    }

    #[test]
    fn test_discarded_hold_leaves_mean_absent() {
        let metrics = run_default(&[down("a", 0), up("a", 2500)]);
        assert_eq!(metrics.mean_khd_ms, None);
        assert_eq!(metrics.sd_khd_ms, None);
        assert_eq!(metrics.cv_khd, None);
    }

    #[test]
    fn test_single_interval() {
        let metrics = run_default(&[down("a", 0), up("a", 50), down("b", 80)]);
        assert_close(metrics.mean_iki_ms, 30.0);
        // One sample: the sample standard deviation is undefined.
        assert_eq!(metrics.sd_iki_ms, None);
        assert_eq!(metrics.cv_iki, None);
    }

    #[test]
    fn test_single_event_group() {
        let metrics = run_default(&[down("a", 0)]);
        assert_eq!(metrics.n_events, 1);
        assert_eq!(metrics.duration_sec, 0.0);
        assert_eq!(metrics.cpm, None);
        assert_eq!(metrics.mean_khd_ms, None);
        assert_eq!(metrics.mean_iki_ms, None);
        assert_eq!(metrics.pause_count_200ms, 0);
        assert_eq!(metrics.backspace_rate, 0.0);
    }

    #[test]
    fn test_empty_group() {
        let metrics = run_default(&[]);
        assert_eq!(metrics.n_events, 0);
        assert_eq!(metrics.n_keydowns, 0);
        assert_eq!(metrics.duration_sec, 0.0);
        assert_eq!(metrics.backspace_rate, 0.0);
        assert_eq!(metrics.cpm, None);
    }

    #[test]
    fn test_backspace_rate_and_cpm() {
        let events = vec![
            down("h", 0),
            down("e", 10_000),
            down("Backspace", 20_000),
            down("e", 30_000),
            down("y", 60_000),
        ];
        let metrics = run_default(&events);
        assert_eq!(metrics.n_keydowns, 5);
        assert_eq!(metrics.backspace_count, 1);
        assert!((metrics.backspace_rate - 0.2).abs() < 1e-12);
        assert_eq!(metrics.duration_sec, 60.0);
        assert_close(metrics.cpm, 4.0);
    }

    #[test]
    fn test_backspace_keyup_not_counted() {
        let events = vec![down("Backspace", 0), up("Backspace", 90)];
        let metrics = run_default(&events);
        assert_eq!(metrics.backspace_count, 1);
        assert_eq!(metrics.n_keydowns, 1);
    }

    #[test]
    fn test_custom_backspace_key() {
        let config = MetricsConfig {
            backspace_key: "Delete".to_string(),
            ..MetricsConfig::default()
        };
        let events = vec![down("Backspace", 0), down("Delete", 100), down("x", 200)];
        let metrics = run(&events, &config);
        assert_eq!(metrics.backspace_count, 1);
    }

    #[test]
    fn test_pause_counts_are_strict() {
        let events = vec![
            up("a", 0),
            down("b", 200), // exactly 200: not a pause
            up("b", 250),
            down("c", 451), // 201
            up("c", 500),
            down("d", 1100), // 600
        ];
        let metrics = run_default(&events);
        assert_eq!(metrics.pause_count_200ms, 2);
        assert_eq!(metrics.pause_count_500ms, 1);
    }

    #[test]
    fn test_dispersion_kinds() {
        // Holds of 100 and 200 ms.
        let events = vec![down("a", 0), up("a", 100), down("b", 300), up("b", 500)];

        let sample = run_default(&events);
        assert_close(sample.mean_khd_ms, 150.0);
        assert_close(sample.sd_khd_ms, 50.0 * 2f64.sqrt());
        assert_close(sample.cv_khd, 50.0 * 2f64.sqrt() / 150.0);

        let population = run(
            &events,
            &MetricsConfig {
                sd_kind: StdDevKind::Population,
                ..MetricsConfig::default()
            },
        );
        assert_close(population.sd_khd_ms, 50.0);
        assert_close(population.cv_khd, 50.0 / 150.0);
    }

    #[test]
    fn test_simultaneous_events_have_no_cpm() {
        let events = vec![down("a", 0), down("b", 0)];
        let metrics = run_default(&events);
        assert_eq!(metrics.duration_sec, 0.0);
        assert_eq!(metrics.cpm, None);
    }

    #[test]
    fn test_first_key_latency() {
        let events = vec![down("a", 1500), up("a", 1600)];
        let start = crate::pairing::test_support::base_ms();
        assert_eq!(first_key_latency_ms(&events, start), Some(1500));
        assert_eq!(first_key_latency_ms(&events, start + 2000), Some(-500));
        assert_eq!(first_key_latency_ms::<KeyEvent>(&[], start), None);
    }
}
