// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Metric kinds, the aggregations they produce, and the selection of which aggregations
//! become datapoints.
//!
//! Every [`MetricKind`] has a fixed, ordered list of candidate [`AggregationKey`]s. A
//! [`DetailSet`] decides which candidates a user wants emitted, and [`select`] walks the
//! candidates in order, keeping every key that the snapshot actually has a value for.
//!
//! `count`, `min`, `mean` and `max` are emitted whenever a snapshot has them, whatever the
//! kind or the detail set. For kinds whose candidate list doesn't name them they follow the
//! kind's own candidates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// The aggregated values of one metric (or one item sub-series of a metric).
pub type Values = BTreeMap<AggregationKey, f64>;

/// The kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// A monotonically increasing count.
    Counter,
    /// A point-in-time reading.
    Gauge,
    /// A count plus its mean and exponentially weighted rates.
    Meter,
    /// A distribution of recorded values.
    Histogram,
    /// A distribution of durations plus the rate at which they were recorded.
    Timer,
}

/// One computed sub-value of a metric, e.g. `mean`, `p99` or `rate_1m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum AggregationKey {
    Count,
    Value,
    Min,
    Max,
    Mean,
    StdDev,
    Median,
    P75,
    P95,
    P98,
    P99,
    P999,
    RateMean,
    Rate1m,
    Rate5m,
    Rate15m,
    ActiveSessions,
    /// Share of the metric's total that an item sub-series accounts for. Snapshots carry it as a
    /// fraction in `[0, 1]`; datapoints carry it as a percentage.
    Percent,
}

impl AggregationKey {
    /// Every aggregation key, in declaration order.
    pub const ALL: [AggregationKey; 18] = [
        Self::Count,
        Self::Value,
        Self::Min,
        Self::Max,
        Self::Mean,
        Self::StdDev,
        Self::Median,
        Self::P75,
        Self::P95,
        Self::P98,
        Self::P99,
        Self::P999,
        Self::RateMean,
        Self::Rate1m,
        Self::Rate5m,
        Self::Rate15m,
        Self::ActiveSessions,
        Self::Percent,
    ];

    /// The name used for this key in metric names and configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Value => "value",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::StdDev => "stddev",
            Self::Median => "median",
            Self::P75 => "p75",
            Self::P95 => "p95",
            Self::P98 => "p98",
            Self::P99 => "p99",
            Self::P999 => "p999",
            Self::RateMean => "rate_mean",
            Self::Rate1m => "rate_1m",
            Self::Rate5m => "rate_5m",
            Self::Rate15m => "rate_15m",
            Self::ActiveSessions => "active_sessions",
            Self::Percent => "percent",
        }
    }

    /// Whether values for this key are counts of events, and so are reported as integers.
    pub const fn is_count_like(self) -> bool {
        matches!(self, Self::Count | Self::ActiveSessions)
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string that doesn't name an [`AggregationKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAggregationKey(pub String);

impl fmt::Display for UnknownAggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown aggregation `{}`", self.0)
    }
}

impl std::error::Error for UnknownAggregationKey {}

impl FromStr for AggregationKey {
    type Err = UnknownAggregationKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAggregationKey(s.to_owned()))
    }
}

use AggregationKey::*;

/// Emitted whenever present, for every kind.
const ALWAYS_EMITTED: &[AggregationKey] = &[Count, Min, Mean, Max];

const COUNTER: &[AggregationKey] = &[Count];
const COUNTER_ITEM: &[AggregationKey] = &[Count, Percent];
const GAUGE: &[AggregationKey] = &[Value];
const METER: &[AggregationKey] = &[Count, RateMean, Rate1m, Rate5m, Rate15m];
const METER_ITEM: &[AggregationKey] = &[Count, Percent, RateMean, Rate1m, Rate5m, Rate15m];
const HISTOGRAM: &[AggregationKey] = &[
    Count, Min, Mean, Max, StdDev, Median, P75, P95, P98, P99, P999,
];
const TIMER: &[AggregationKey] = &[
    Count,
    Min,
    Mean,
    Max,
    StdDev,
    Median,
    P75,
    P95,
    P98,
    P99,
    P999,
    RateMean,
    Rate1m,
    Rate5m,
    Rate15m,
    ActiveSessions,
];

impl MetricKind {
    /// The ordered candidate aggregations for a metric of this kind.
    pub const fn candidates(self) -> &'static [AggregationKey] {
        match self {
            Self::Counter => COUNTER,
            Self::Gauge => GAUGE,
            Self::Meter => METER,
            Self::Histogram => HISTOGRAM,
            Self::Timer => TIMER,
        }
    }

    /// The ordered candidate aggregations for one item sub-series of a tagged metric.
    pub const fn item_candidates(self) -> &'static [AggregationKey] {
        match self {
            Self::Counter => COUNTER_ITEM,
            Self::Gauge => GAUGE,
            Self::Meter => METER_ITEM,
            Self::Histogram => HISTOGRAM,
            Self::Timer => TIMER,
        }
    }

    /// The reading that defines this kind, emitted regardless of the detail set.
    pub const fn primary(self) -> Option<AggregationKey> {
        match self {
            Self::Counter => Some(Count),
            Self::Gauge => Some(Value),
            Self::Meter | Self::Histogram | Self::Timer => None,
        }
    }
}

/// The aggregations a user wants emitted per metric.
///
/// An empty detail set stands for [`DetailSet::DEFAULT_KEYS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSet(BTreeSet<AggregationKey>);

impl DetailSet {
    /// The aggregations emitted when nothing else is configured.
    pub const DEFAULT_KEYS: [AggregationKey; 4] = [Count, Min, Mean, Max];

    /// Creates a detail set containing exactly `keys`.
    pub fn new(keys: impl IntoIterator<Item = AggregationKey>) -> Self {
        Self(keys.into_iter().collect())
    }

    /// Creates a detail set containing every aggregation.
    pub fn all() -> Self {
        Self::new(AggregationKey::ALL)
    }

    /// Whether `key` should be emitted.
    pub fn contains(&self, key: AggregationKey) -> bool {
        if self.0.is_empty() {
            Self::DEFAULT_KEYS.contains(&key)
        } else {
            self.0.contains(&key)
        }
    }

    /// Iterates the configured keys (not the defaults an empty set stands for).
    pub fn iter(&self) -> impl Iterator<Item = AggregationKey> + '_ {
        self.0.iter().copied()
    }
}

impl Default for DetailSet {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEYS)
    }
}

impl FromIterator<AggregationKey> for DetailSet {
    fn from_iter<T: IntoIterator<Item = AggregationKey>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Selects the aggregations of a whole metric that should become datapoints, in the kind's
/// candidate order.
pub fn select(
    kind: MetricKind,
    values: &Values,
    detail_set: &DetailSet,
) -> Vec<(AggregationKey, f64)> {
    select_from(kind.candidates(), kind.primary(), values, detail_set)
}

/// Like [`select`], for one item sub-series of a tagged metric.
pub fn select_item(
    kind: MetricKind,
    values: &Values,
    detail_set: &DetailSet,
) -> Vec<(AggregationKey, f64)> {
    select_from(kind.item_candidates(), kind.primary(), values, detail_set)
}

fn select_from(
    candidates: &[AggregationKey],
    primary: Option<AggregationKey>,
    values: &Values,
    detail_set: &DetailSet,
) -> Vec<(AggregationKey, f64)> {
    let universal = ALWAYS_EMITTED.iter().filter(|key| !candidates.contains(key));
    candidates
        .iter()
        .chain(universal)
        .filter(|&&key| {
            Some(key) == primary || ALWAYS_EMITTED.contains(&key) || detail_set.contains(key)
        })
        .filter_map(|&key| values.get(&key).map(|value| (key, *value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn values(entries: &[(AggregationKey, f64)]) -> Values {
        entries.iter().copied().collect()
    }

    #[test]
    fn keys_round_trip_through_their_names() {
        for key in AggregationKey::ALL {
            assert_eq!(key.as_str().parse::<AggregationKey>(), Ok(key));
        }
        assert_eq!("P99".parse::<AggregationKey>(), Ok(P99));
        assert_eq!(
            "p42".parse::<AggregationKey>(),
            Err(UnknownAggregationKey("p42".into()))
        );
    }

    #[test]
    fn timer_with_default_details() {
        let timer = values(&[
            (Count, 5.0),
            (Min, 1.0),
            (Mean, 2.0),
            (Max, 10.0),
            (P99, 9.0),
            (Rate1m, 0.5),
        ]);
        assert_eq!(
            select(MetricKind::Timer, &timer, &DetailSet::default()),
            vec![(Count, 5.0), (Min, 1.0), (Mean, 2.0), (Max, 10.0)]
        );
    }

    #[test]
    fn empty_detail_set_means_default() {
        let histogram = values(&[(Count, 3.0), (Max, 7.0), (StdDev, 1.5)]);
        assert_eq!(
            select(MetricKind::Histogram, &histogram, &DetailSet::new([])),
            vec![(Count, 3.0), (Max, 7.0)]
        );
    }

    #[test]
    fn follows_candidate_order_not_detail_order() {
        let timer = values(&[(Rate15m, 1.0), (P95, 2.0), (Count, 3.0)]);
        let details = DetailSet::new([Rate15m, P95, Count]);
        assert_eq!(
            select(MetricKind::Timer, &timer, &details),
            vec![(Count, 3.0), (P95, 2.0), (Rate15m, 1.0)]
        );
    }

    #[rstest]
    #[case::counter(MetricKind::Counter, Count)]
    #[case::gauge(MetricKind::Gauge, Value)]
    fn primary_reading_ignores_detail_set(#[case] kind: MetricKind, #[case] key: AggregationKey) {
        let only_p99 = DetailSet::new([P99]);
        assert_eq!(
            select(kind, &values(&[(key, 4.0)]), &only_p99),
            vec![(key, 4.0)]
        );
    }

    #[test]
    fn candidates_outside_the_kind_are_ignored() {
        // a gauge never reports a p99, even if the registry hands one over
        let gauge = values(&[(Value, 1.0), (P99, 2.0)]);
        assert_eq!(
            select(MetricKind::Gauge, &gauge, &DetailSet::all()),
            vec![(Value, 1.0)]
        );
    }

    #[test]
    fn count_min_mean_max_ignore_detail_set() {
        let histogram = values(&[(Count, 4.0), (Min, 1.0), (Mean, 2.0), (Max, 3.0), (P99, 3.0)]);
        assert_eq!(
            select(MetricKind::Histogram, &histogram, &DetailSet::new([P99])),
            vec![(Count, 4.0), (Min, 1.0), (Mean, 2.0), (Max, 3.0), (P99, 3.0)]
        );
    }

    #[rstest]
    #[case::gauge(MetricKind::Gauge, vec![(Value, 5.0), (Count, 2.0), (Min, 4.0), (Mean, 5.0), (Max, 6.0)])]
    #[case::counter(MetricKind::Counter, vec![(Count, 2.0), (Min, 4.0), (Mean, 5.0), (Max, 6.0)])]
    #[case::meter(MetricKind::Meter, vec![(Count, 2.0), (Min, 4.0), (Mean, 5.0), (Max, 6.0)])]
    fn count_min_mean_max_apply_to_every_kind(
        #[case] kind: MetricKind,
        #[case] expected: Vec<(AggregationKey, f64)>,
    ) {
        let reading = values(&[(Value, 5.0), (Count, 2.0), (Min, 4.0), (Mean, 5.0), (Max, 6.0)]);
        let reading: Values = reading
            .into_iter()
            .filter(|(key, _)| *key != Value || kind == MetricKind::Gauge)
            .collect();
        assert_eq!(select(kind, &reading, &DetailSet::new([P99])), expected);
    }

    #[test]
    fn missing_values_are_omitted() {
        let meter = values(&[(Count, 10.0), (Rate5m, 0.2)]);
        assert_eq!(
            select(MetricKind::Meter, &meter, &DetailSet::all()),
            vec![(Count, 10.0), (Rate5m, 0.2)]
        );
    }

    #[test]
    fn item_candidates_include_percent() {
        let item = values(&[(Count, 2.0), (Percent, 0.25), (Rate1m, 0.1)]);
        assert_eq!(
            select_item(MetricKind::Meter, &item, &DetailSet::new([Percent, Rate1m])),
            vec![(Count, 2.0), (Percent, 0.25), (Rate1m, 0.1)]
        );
        assert_eq!(
            select_item(MetricKind::Counter, &item, &DetailSet::new([Percent])),
            vec![(Count, 2.0), (Percent, 0.25)]
        );
    }
}
