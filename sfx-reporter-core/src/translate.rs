// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Turns metric snapshots into datapoints.
//!
//! Datapoints are produced in a fixed order: metrics in registry order, then for each metric
//! its own aggregations followed by each item sub-series in registration order, and within
//! a group the kind's candidate order. Given the same inputs the output is identical.

use std::time::SystemTime;

use crate::aggregation::{self, AggregationKey, DetailSet, MetricKind};
use crate::{Datapoint, LabelSet, MetricSnapshot, MetricType, MetricValue};

/// Translates one metric snapshot.
///
/// `base_labels` must already contain the default dimensions and the source (see
/// [`crate::dimensions::merge`]); item sub-series layer their own labels on top of it.
pub fn translate(
    snapshot: &MetricSnapshot,
    base_labels: &LabelSet,
    timestamp: SystemTime,
    detail_set: &DetailSet,
) -> Vec<Datapoint> {
    let kind = snapshot.kind();
    let mut datapoints = Vec::new();

    let selected = aggregation::select(kind, snapshot.values(), detail_set);
    push_group(
        &mut datapoints,
        snapshot.name(),
        kind,
        &selected,
        base_labels,
        timestamp,
    );

    for item in snapshot.items() {
        let selected = aggregation::select_item(kind, item.values(), detail_set);
        if selected.is_empty() {
            continue;
        }
        let labels = base_labels.with_item_labels(item.labels());
        // without a usable label the item would overwrite the metric's own series
        if labels == *base_labels {
            continue;
        }
        push_group(
            &mut datapoints,
            snapshot.name(),
            kind,
            &selected,
            &labels,
            timestamp,
        );
    }

    datapoints
}

/// Translates every snapshot of a cycle, preserving registry order.
pub fn translate_all(
    snapshots: &[MetricSnapshot],
    base_labels: &LabelSet,
    timestamp: SystemTime,
    detail_set: &DetailSet,
) -> Vec<Datapoint> {
    snapshots
        .iter()
        .flat_map(|snapshot| translate(snapshot, base_labels, timestamp, detail_set))
        .collect()
}

fn push_group(
    out: &mut Vec<Datapoint>,
    name: &str,
    kind: MetricKind,
    selected: &[(AggregationKey, f64)],
    labels: &LabelSet,
    timestamp: SystemTime,
) {
    // a lone primary reading (a plain counter or gauge) needs no suffix
    let bare = matches!(selected, [(key, _)] if Some(*key) == kind.primary());
    for &(key, raw) in selected {
        let metric = if bare {
            name.to_owned()
        } else {
            format!("{name}.{key}")
        };
        out.push(Datapoint::new(
            metric,
            datapoint_value(key, raw),
            labels.clone(),
            timestamp,
            metric_type(kind, key),
        ));
    }
}

fn datapoint_value(key: AggregationKey, raw: f64) -> MetricValue {
    match key {
        AggregationKey::Percent => MetricValue::Float(raw * 100.0),
        key if key.is_count_like() && raw.is_finite() && raw.fract() == 0.0 => {
            MetricValue::Integer(raw as i64)
        }
        _ => MetricValue::Float(raw),
    }
}

fn metric_type(kind: MetricKind, key: AggregationKey) -> MetricType {
    match (kind, key) {
        (MetricKind::Gauge, _) => MetricType::Gauge,
        (_, AggregationKey::Count) => MetricType::CumulativeCounter,
        _ => MetricType::Gauge,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::aggregation::AggregationKey::*;
    use crate::{ItemSnapshot, dimensions};

    fn base() -> LabelSet {
        let defaults: LabelSet = [("environment", "prod")].into_iter().collect();
        dimensions::merge(&defaults, "host1", &[] as &[&str])
    }

    fn ts() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn names_and_values(datapoints: &[Datapoint]) -> Vec<(&str, MetricValue)> {
        datapoints.iter().map(|d| (d.metric(), d.value())).collect()
    }

    #[test]
    fn timer_scenario() {
        let snapshot = MetricSnapshot::new("api.use", MetricKind::Timer)
            .with_value(Count, 5.0)
            .with_value(Min, 1.0)
            .with_value(Mean, 2.0)
            .with_value(Max, 10.0);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::default());
        assert_eq!(
            names_and_values(&datapoints),
            vec![
                ("api.use.count", MetricValue::Integer(5)),
                ("api.use.min", MetricValue::Float(1.0)),
                ("api.use.mean", MetricValue::Float(2.0)),
                ("api.use.max", MetricValue::Float(10.0)),
            ]
        );
        let expected: LabelSet = [("environment", "prod"), ("source", "host1")]
            .into_iter()
            .collect();
        for datapoint in &datapoints {
            assert_eq!(datapoint.labels(), &expected);
            assert_eq!(datapoint.timestamp(), ts());
        }
        assert_eq!(datapoints[0].metric_type(), MetricType::CumulativeCounter);
        assert_eq!(datapoints[1].metric_type(), MetricType::Gauge);
    }

    #[test]
    fn plain_counter_uses_bare_name() {
        let snapshot = MetricSnapshot::new("requests", MetricKind::Counter).with_value(Count, 3.0);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::default());
        assert_eq!(
            names_and_values(&datapoints),
            vec![("requests", MetricValue::Integer(3))]
        );
        assert_eq!(datapoints[0].metric_type(), MetricType::CumulativeCounter);
    }

    #[test]
    fn gauge_uses_bare_name() {
        let snapshot = MetricSnapshot::new("queue.depth", MetricKind::Gauge).with_value(Value, 12.5);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::default());
        assert_eq!(
            names_and_values(&datapoints),
            vec![("queue.depth", MetricValue::Float(12.5))]
        );
        assert_eq!(datapoints[0].metric_type(), MetricType::Gauge);
    }

    #[test]
    fn lone_non_primary_aggregation_keeps_suffix() {
        let snapshot = MetricSnapshot::new("latency", MetricKind::Histogram).with_value(P99, 8.0);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::new([P99]));
        assert_eq!(
            names_and_values(&datapoints),
            vec![("latency.p99", MetricValue::Float(8.0))]
        );
    }

    #[test]
    fn count_survives_a_narrow_detail_set() {
        let snapshot = MetricSnapshot::new("latency", MetricKind::Histogram)
            .with_value(Count, 2.0)
            .with_value(StdDev, 1.0)
            .with_value(P99, 8.0);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::new([P99]));
        assert_eq!(
            names_and_values(&datapoints),
            vec![
                ("latency.count", MetricValue::Integer(2)),
                ("latency.p99", MetricValue::Float(8.0)),
            ]
        );
    }

    #[test]
    fn item_without_usable_labels_is_skipped() {
        let snapshot = MetricSnapshot::new("api.calls", MetricKind::Counter)
            .with_value(Count, 5.0)
            .with_item(
                ItemSnapshot::new(["badlabel"])
                    .with_value(Count, 1.0)
                    .with_value(Percent, 0.2),
            )
            .with_item(
                ItemSnapshot::new(["source=host1", "empty="])
                    .with_value(Count, 2.0)
                    .with_value(Percent, 0.4),
            )
            .with_item(
                ItemSnapshot::new(["api_type=login"])
                    .with_value(Count, 2.0)
                    .with_value(Percent, 0.4),
            );
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::default());

        assert_eq!(
            names_and_values(&datapoints),
            vec![
                ("api.calls", MetricValue::Integer(5)),
                ("api.calls", MetricValue::Integer(2)),
            ]
        );
        assert_eq!(datapoints[0].labels(), &base());
        assert_eq!(datapoints[1].labels().get("api_type"), Some("login"));
        // every series is reported once per cycle
        for (i, a) in datapoints.iter().enumerate() {
            for b in &datapoints[i + 1..] {
                assert!(a.metric() != b.metric() || a.labels() != b.labels());
            }
        }
    }

    #[test]
    fn tagged_counter_emits_one_group_per_item() {
        let snapshot = MetricSnapshot::new("api.calls", MetricKind::Counter)
            .with_value(Count, 4.0)
            .with_item(
                ItemSnapshot::new(["api_type=login", "badlabel"])
                    .with_value(Count, 3.0)
                    .with_value(Percent, 0.75),
            )
            .with_item(
                ItemSnapshot::new(["api_type=logout"])
                    .with_value(Count, 1.0)
                    .with_value(Percent, 0.25),
            );
        let details = DetailSet::new([Count, Percent]);
        let datapoints = translate(&snapshot, &base(), ts(), &details);
        assert_eq!(
            names_and_values(&datapoints),
            vec![
                ("api.calls", MetricValue::Integer(4)),
                ("api.calls.count", MetricValue::Integer(3)),
                ("api.calls.percent", MetricValue::Float(75.0)),
                ("api.calls.count", MetricValue::Integer(1)),
                ("api.calls.percent", MetricValue::Float(25.0)),
            ]
        );
        assert!(!datapoints[0].labels().contains_key("api_type"));
        assert_eq!(datapoints[1].labels().get("api_type"), Some("login"));
        assert!(!datapoints[1].labels().contains_key("badlabel"));
        assert_eq!(datapoints[1].labels().get("source"), Some("host1"));
        assert_eq!(datapoints[4].labels().get("api_type"), Some("logout"));
    }

    #[test]
    fn nan_passes_through() {
        let snapshot = MetricSnapshot::new("broken", MetricKind::Histogram)
            .with_value(Count, f64::NAN)
            .with_value(Mean, f64::NAN);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::default());
        assert_eq!(datapoints.len(), 2);
        for datapoint in datapoints {
            match datapoint.value() {
                MetricValue::Float(v) => assert!(v.is_nan()),
                other => panic!("expected NaN, got {other:?}"),
            }
        }
    }

    #[test]
    fn fractional_counts_stay_floats() {
        let snapshot = MetricSnapshot::new("odd", MetricKind::Meter).with_value(Count, 2.5);
        let datapoints = translate(&snapshot, &base(), ts(), &DetailSet::default());
        assert_eq!(
            names_and_values(&datapoints),
            vec![("odd.count", MetricValue::Float(2.5))]
        );
    }

    #[test]
    fn translation_is_idempotent() {
        let snapshot = MetricSnapshot::new("api.use", MetricKind::Timer)
            .with_value(Count, 5.0)
            .with_value(P999, 0.1 + 0.2)
            .with_value(Rate1m, 1.0 / 3.0)
            .with_item(ItemSnapshot::new(["a=b"]).with_value(Mean, 7.0));
        let first = translate(&snapshot, &base(), ts(), &DetailSet::all());
        let second = translate(&snapshot, &base(), ts(), &DetailSet::all());
        assert_eq!(first, second);
        let bits = |d: &[Datapoint]| -> Vec<u64> {
            d.iter().map(|d| d.value().as_f64().to_bits()).collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn translate_all_keeps_registry_order() {
        let snapshots = vec![
            MetricSnapshot::new("b", MetricKind::Gauge).with_value(Value, 1.0),
            MetricSnapshot::new("a", MetricKind::Counter).with_value(Count, 2.0),
        ];
        let datapoints = translate_all(&snapshots, &base(), ts(), &DetailSet::default());
        assert_eq!(
            names_and_values(&datapoints),
            vec![("b", MetricValue::Float(1.0)), ("a", MetricValue::Integer(2))]
        );
    }
}
