//! Rollup builder
//!
//! Runs pairing and aggregation over three groupings of one event set:
//! per (session, test), per session across all tests ("overall"), and per
//! (session, test, field). All three passes go through [`rollup_by`]; they only
//! differ in the grouping key.

use crate::aggregate::{earliest_ms, first_key_latency_ms, MetricsAggregator};
use crate::config::MetricsConfig;
use crate::pairing::{pair_hold_durations, pair_inter_key_intervals};
use crate::schema::{KeyEvent, TestType};
use crate::types::{FieldMetricsRow, GroupMetrics, MetricsRow, RollupTables};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// One aggregated group
#[derive(Debug, Clone)]
pub struct GroupRollup<'a, K> {
    pub key: K,
    /// The group's events in ascending `pressed_at` order
    pub events: Vec<&'a KeyEvent>,
    pub metrics: GroupMetrics,
}

/// Group `events` by `key_fn`, then pair and aggregate every group.
///
/// Events for which `key_fn` returns `None` are left out. Groups come back in
/// ascending key order. Within a group events are stably sorted by
/// `pressed_at`, so simultaneous events keep their input order.
pub fn rollup_by<'a, K, F>(
    events: &'a [KeyEvent],
    config: &MetricsConfig,
    key_fn: F,
) -> Vec<GroupRollup<'a, K>>
where
    K: Ord + Debug,
    F: Fn(&'a KeyEvent) -> Option<K>,
{
    let mut groups: BTreeMap<K, Vec<&'a KeyEvent>> = BTreeMap::new();
    for event in events {
        if let Some(key) = key_fn(event) {
            groups.entry(key).or_default().push(event);
        }
    }

    groups
        .into_iter()
        .map(|(key, mut group)| {
            group.sort_by_key(|event| event.pressed_at);

            let holds = pair_hold_durations(&group, config);
            let intervals = pair_inter_key_intervals(&group, config);
            let metrics = MetricsAggregator::aggregate(&group, &holds, &intervals, config);

            debug!(
                "group {:?}: {} events, {} holds, {} intervals",
                key,
                group.len(),
                holds.len(),
                intervals.len()
            );

            GroupRollup {
                key,
                events: group,
                metrics,
            }
        })
        .collect()
}

/// Metrics table: per (session, test) rows followed by per-session overall rows
pub fn compute_metrics(events: &[KeyEvent], config: &MetricsConfig) -> Vec<MetricsRow> {
    let per_test = rollup_by(events, config, |e| {
        Some((e.session_id.as_str(), &e.test_type))
    });
    let overall = rollup_by(events, config, |e| Some(e.session_id.as_str()));

    info!(
        "computed {} per-test rows and {} overall rows",
        per_test.len(),
        overall.len()
    );

    let per_test_rows = per_test.into_iter().map(|group| {
        let (session_id, test_type) = group.key;
        MetricsRow {
            session_id: session_id.to_string(),
            test_type: test_type.clone(),
            metrics: group.metrics,
        }
    });
    let overall_rows = overall.into_iter().map(|group| MetricsRow {
        session_id: group.key.to_string(),
        test_type: TestType::Overall,
        metrics: group.metrics,
    });

    per_test_rows.chain(overall_rows).collect()
}

/// Per-field metrics table.
///
/// Events without a field name, or with a blank one, are excluded. Latency is
/// measured from the earliest event of the enclosing (session, test), field or
/// not.
pub fn compute_field_metrics(events: &[KeyEvent], config: &MetricsConfig) -> Vec<FieldMetricsRow> {
    let test_starts = test_start_times(events);

    let per_field = rollup_by(events, config, |e| {
        e.non_blank_field()
            .map(|field| (e.session_id.as_str(), &e.test_type, field))
    });

    info!("computed {} per-field rows", per_field.len());

    per_field
        .into_iter()
        .filter_map(|group| {
            let (session_id, test_type, field_name) = group.key;
            // Every field group is a subset of its test, so the start exists.
            let test_start = *test_starts.get(&(session_id, test_type))?;
            let latency = first_key_latency_ms(&group.events, test_start)?;
            Some(FieldMetricsRow {
                session_id: session_id.to_string(),
                test_type: test_type.clone(),
                field_name: field_name.to_string(),
                metrics: group.metrics,
                first_key_latency_ms: latency,
            })
        })
        .collect()
}

/// Both tables in one call
pub fn compute_all(events: &[KeyEvent], config: &MetricsConfig) -> RollupTables {
    RollupTables {
        metrics: compute_metrics(events, config),
        field_metrics: compute_field_metrics(events, config),
    }
}

/// Earliest event time per (session, test)
fn test_start_times(events: &[KeyEvent]) -> BTreeMap<(&str, &TestType), i64> {
    let mut grouped: BTreeMap<(&str, &TestType), Vec<&KeyEvent>> = BTreeMap::new();
    for event in events {
        grouped
            .entry((event.session_id.as_str(), &event.test_type))
            .or_default()
            .push(event);
    }
    grouped
        .into_iter()
        .filter_map(|(key, group)| earliest_ms(&group).map(|start| (key, start)))
        .collect()
}
