// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, Mutex, RwLock, atomic::AtomicU64, atomic::Ordering},
    time::SystemTime,
};

use metrics_024::{Counter, Gauge, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util_020::registry::{Registry, Storage};
use sfx_reporter_core::{
    AggregationKey, ItemSnapshot, MetricKind, MetricRegistry, MetricSnapshot, TimeSource, Values,
};

use crate::histogram::{Distribution, Histogram};
use crate::rates::RateState;
use crate::unit::{counter_kind, histogram_shape};

/// A [`Storage`] that uses [`Histogram`] for its histogram implementation.
pub struct AtomicStorageWithHistogram;

impl<K> Storage<K> for AtomicStorageWithHistogram {
    type Counter = Arc<AtomicU64>;
    type Gauge = Arc<AtomicU64>;
    type Histogram = Arc<Histogram>;

    fn counter(&self, _: &K) -> Self::Counter {
        Arc::new(AtomicU64::new(0))
    }

    fn gauge(&self, _: &K) -> Self::Gauge {
        Arc::new(AtomicU64::new(0))
    }

    fn histogram(&self, _: &K) -> Self::Histogram {
        Arc::new(Histogram::new())
    }
}

type Series<T> = Vec<(Vec<String>, T)>;

struct MetricRecorderInner {
    registry: Registry<Key, AtomicStorageWithHistogram>,
    units: RwLock<HashMap<String, Unit>>,
    rates: Mutex<HashMap<(String, Vec<String>), RateState>>,
    time_source: TimeSource,
}

/// The metric recorder belonging to this crate.
///
/// Accumulates metrics.rs metrics in a registry and turns them into one
/// [`MetricSnapshot`] per metric name every time the reporter asks for a snapshot:
///
/// - counters report their cumulative count. A counter described with
///   [`Unit::CountPerSecond`] is a meter and also reports its rates.
/// - gauges report their last value.
/// - histograms report their distribution since the previous snapshot. A histogram
///   described with a time unit is a timer, reported in milliseconds, with rates.
///
/// Metrics registered with labels become items of the metric with the same name.
#[derive(Clone)]
pub struct MetricRecorder(Arc<MetricRecorderInner>);

impl fmt::Debug for MetricRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRecorder")
            .field("time_source", &self.0.time_source)
            .finish_non_exhaustive()
    }
}

impl Default for MetricRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRecorder {
    /// Create a new metric recorder reading the system clock
    pub fn new() -> Self {
        Self::with_time_source(TimeSource::System)
    }

    /// Create a new metric recorder that computes rates against `time_source`
    pub fn with_time_source(time_source: TimeSource) -> Self {
        Self(Arc::new(MetricRecorderInner {
            registry: Registry::new(AtomicStorageWithHistogram),
            units: RwLock::new(HashMap::new()),
            rates: Mutex::new(HashMap::new()),
            time_source,
        }))
    }

    /// Install this recorder as the process-wide metrics.rs recorder.
    pub fn install(&self) -> Result<(), InstallError> {
        metrics_024::set_global_recorder(self.clone()).map_err(|_| InstallError)
    }
}

/// Returned by [`MetricRecorder::install`] when a global recorder is already set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallError;

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a global metrics recorder is already installed")
    }
}

impl std::error::Error for InstallError {}

impl Recorder for MetricRecorder {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, _description: SharedString) {
        self.0.describe(key, unit);
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, _description: SharedString) {
        self.0.describe(key, unit);
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, _description: SharedString) {
        self.0.describe(key, unit);
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.0.registry.get_or_create_counter(key, Clone::clone))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.0.registry.get_or_create_gauge(key, Clone::clone))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics_024::Histogram {
        metrics_024::Histogram::from_arc(self.0.registry.get_or_create_histogram(key, Clone::clone))
    }
}

impl MetricRegistry for MetricRecorder {
    fn snapshot(&self) -> Vec<MetricSnapshot> {
        self.0.snapshot()
    }
}

impl MetricRecorderInner {
    fn describe(&self, key: KeyName, unit: Option<Unit>) {
        if let Some(unit) = unit {
            self.units
                .write()
                .unwrap()
                .insert(key.as_str().to_string(), unit);
        }
    }

    fn snapshot(&self) -> Vec<MetricSnapshot> {
        let now = self.time_source.now();

        let mut counters = Vec::new();
        self.registry.visit_counters(|key, counter| {
            counters.push((key.clone(), counter.load(Ordering::Relaxed)));
        });
        let mut gauges = Vec::new();
        self.registry.visit_gauges(|key, gauge| {
            gauges.push((key.clone(), f64::from_bits(gauge.load(Ordering::Relaxed))));
        });
        let mut histograms = Vec::new();
        self.registry.visit_histograms(|key, histogram| {
            histograms.push((key.clone(), histogram.drain()));
        });

        let units = self.units.read().unwrap();
        let unit = |name: &str| units.get(name).cloned();
        let mut states = self.rates.lock().unwrap();
        let mut rates = Rates {
            states: &mut states,
            now,
        };

        let mut snapshots = Vec::new();
        for (name, series) in by_name(counters) {
            let kind = counter_kind(unit(name.as_str()));
            snapshots.push(counter_snapshot(name, kind, series, &mut rates));
        }
        for (name, series) in by_name(gauges) {
            snapshots.push(gauge_snapshot(name, series));
        }
        for (name, series) in by_name(histograms) {
            let shape = histogram_shape(unit(name.as_str()));
            snapshots.push(histogram_snapshot(
                name,
                shape.kind,
                shape.scale,
                series,
                &mut rates,
            ));
        }
        // stable, so a counter and a gauge sharing a name keep that order
        snapshots.sort_by(|a, b| a.name().cmp(b.name()));
        tracing::trace!(metrics = snapshots.len(), "took registry snapshot");
        snapshots
    }
}

struct Rates<'a> {
    states: &'a mut HashMap<(String, Vec<String>), RateState>,
    now: SystemTime,
}

impl Rates<'_> {
    fn observe(&mut self, name: &str, labels: &[String], count: u64) -> Values {
        let now = self.now;
        self.states
            .entry((name.to_owned(), labels.to_vec()))
            .or_insert_with(|| RateState::new(now, count))
            .observe(now, count)
    }
}

/// Groups readings by metric name, with each name's series sorted by labels.
fn by_name<T>(readings: Vec<(Key, T)>) -> BTreeMap<String, Series<T>> {
    let mut grouped: BTreeMap<String, Series<T>> = BTreeMap::new();
    for (key, reading) in readings {
        let labels = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        grouped
            .entry(key.name().to_owned())
            .or_default()
            .push((labels, reading));
    }
    for series in grouped.values_mut() {
        series.sort_by(|a, b| a.0.cmp(&b.0));
    }
    grouped
}

fn counter_snapshot(
    name: String,
    kind: MetricKind,
    series: Series<u64>,
    rates: &mut Rates<'_>,
) -> MetricSnapshot {
    let total: u64 = series.iter().map(|(_, count)| count).sum();
    let mut values = Values::from([(AggregationKey::Count, total as f64)]);
    if kind == MetricKind::Meter {
        values.extend(rates.observe(&name, &[], total));
    }

    let mut snapshot = MetricSnapshot::new(name.clone(), kind);
    for (labels, count) in series.into_iter().filter(|(labels, _)| !labels.is_empty()) {
        let share = if total > 0 {
            count as f64 / total as f64
        } else {
            0.0
        };
        let mut item = Values::from([
            (AggregationKey::Count, count as f64),
            (AggregationKey::Percent, share),
        ]);
        if kind == MetricKind::Meter {
            item.extend(rates.observe(&name, &labels, count));
        }
        snapshot = snapshot.with_item(ItemSnapshot::new(labels).with_values(item));
    }
    snapshot.with_values(values)
}

fn gauge_snapshot(name: String, series: Series<f64>) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::new(name, MetricKind::Gauge);
    for (labels, value) in series {
        snapshot = if labels.is_empty() {
            snapshot.with_value(AggregationKey::Value, value)
        } else {
            snapshot.with_item(ItemSnapshot::new(labels).with_value(AggregationKey::Value, value))
        };
    }
    snapshot
}

fn histogram_snapshot(
    name: String,
    kind: MetricKind,
    scale: f64,
    series: Series<Distribution>,
    rates: &mut Rates<'_>,
) -> MetricSnapshot {
    let merged = Distribution::merge(series.iter().map(|(_, distribution)| distribution));
    let mut values = merged.values(scale);
    if kind == MetricKind::Timer {
        values.extend(rates.observe(&name, &[], merged.total));
    }

    let mut snapshot = MetricSnapshot::new(name.clone(), kind);
    for (labels, distribution) in series.into_iter().filter(|(labels, _)| !labels.is_empty()) {
        let mut item = distribution.values(scale);
        if kind == MetricKind::Timer {
            item.extend(rates.observe(&name, &labels, distribution.total));
        }
        snapshot = snapshot.with_item(ItemSnapshot::new(labels).with_values(item));
    }
    snapshot.with_values(values)
}

#[cfg(test)]
mod test {
    use metrics_024::{counter, gauge, histogram, with_local_recorder};
    use sfx_reporter_core::AggregationKey::*;

    use super::*;

    fn find<'a>(snapshots: &'a [MetricSnapshot], name: &str) -> &'a MetricSnapshot {
        snapshots
            .iter()
            .find(|s| s.name() == name)
            .unwrap_or_else(|| panic!("no metric named {name}"))
    }

    #[test]
    fn counters_are_cumulative() {
        let recorder = MetricRecorder::new();
        with_local_recorder(&recorder, || counter!("a").increment(2));
        assert_eq!(find(&recorder.snapshot(), "a").values()[&Count], 2.0);
        with_local_recorder(&recorder, || counter!("a").increment(3));
        let snapshots = recorder.snapshot();
        let a = find(&snapshots, "a");
        assert_eq!(a.kind(), MetricKind::Counter);
        assert_eq!(a.values()[&Count], 5.0);
        assert!(a.items().is_empty());
    }

    #[test]
    fn gauges_keep_last_value() {
        let recorder = MetricRecorder::new();
        with_local_recorder(&recorder, || {
            gauge!("g").set(4.5);
            gauge!("g").set(1.5);
        });
        let snapshots = recorder.snapshot();
        let g = find(&snapshots, "g");
        assert_eq!(g.kind(), MetricKind::Gauge);
        assert_eq!(g.values()[&Value], 1.5);
        assert_eq!(find(&recorder.snapshot(), "g").values()[&Value], 1.5);
    }

    #[test]
    fn labeled_counters_become_items() {
        let recorder = MetricRecorder::new();
        with_local_recorder(&recorder, || {
            counter!("api.calls", "api_type" => "search").increment(1);
            counter!("api.calls", "api_type" => "login").increment(3);
        });
        let snapshots = recorder.snapshot();
        let calls = find(&snapshots, "api.calls");
        assert_eq!(calls.values()[&Count], 4.0);
        let items = calls.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].labels(), ["api_type=login"]);
        assert_eq!(items[0].values()[&Count], 3.0);
        assert_eq!(items[0].values()[&Percent], 0.75);
        assert_eq!(items[1].labels(), ["api_type=search"]);
        assert_eq!(items[1].values()[&Percent], 0.25);
    }

    #[test]
    fn snapshots_are_sorted_by_name() {
        let recorder = MetricRecorder::new();
        with_local_recorder(&recorder, || {
            histogram!("c").record(1.0);
            gauge!("b").set(1.0);
            counter!("a").increment(1);
        });
        let names: Vec<_> = recorder
            .snapshot()
            .iter()
            .map(|s| s.name().to_owned())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn histogram_without_unit() {
        let recorder = MetricRecorder::new();
        with_local_recorder(&recorder, || {
            let histogram = histogram!("sizes");
            histogram.record(1.0);
            histogram.record(3.0);
        });
        let snapshots = recorder.snapshot();
        let sizes = find(&snapshots, "sizes");
        assert_eq!(sizes.kind(), MetricKind::Histogram);
        assert_eq!(sizes.values()[&Count], 2.0);
        assert!(!sizes.values().contains_key(&Rate1m));
    }
}
