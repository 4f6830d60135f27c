// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Histogram class to record a distribution of values and summarize it once per cycle

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};

use histogram::AtomicHistogram;
use metrics_024::HistogramFn;
use sfx_reporter_core::{AggregationKey, Values};

/// Values are stored as integer millionths, so fractional seconds survive bucketing.
const SCALE: f64 = 1_000_000.0;
const GROUPING_POWER: u8 = 6;
const MAX_VALUE_POWER: u8 = 48;
const MAX_SCALED: u64 = (1 << MAX_VALUE_POWER) - 1;

/// A histogram supporting parallel insertion and draining.
///
/// This uses `histogram::Config::new(6, 48)`: 64 buckets per binary order of magnitude
/// (relative error under 1.6%) up to 2^48 millionths. Negative and NaN values are recorded
/// as 0, values past the range are recorded at the top of it.
///
/// The distribution is reset every time it is summarized, so each cycle reports the values
/// recorded since the previous cycle. The count is cumulative.
pub struct Histogram {
    inner: AtomicHistogram,
    total: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Creates a default histogram instance
    pub fn new() -> Self {
        Self {
            inner: AtomicHistogram::with_config(&Self::default_configuration()),
            total: AtomicU64::new(0),
        }
    }

    fn default_configuration() -> histogram::Config {
        histogram::Config::new(GROUPING_POWER, MAX_VALUE_POWER).expect("known good configuration")
    }

    /// Records an occurrence of a value in the histogram.
    pub fn record(&self, value: f64) {
        let scaled = (value * SCALE).clamp(0.0, MAX_SCALED as f64) as u64;
        // never out of bounds after the clamp above
        let _ = self.inner.add(scaled, 1);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of values recorded since the histogram was created.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Summarizes and resets the distribution recorded since the last call.
    pub(crate) fn drain(&self) -> Distribution {
        let buckets = self
            .inner
            .drain()
            .iter()
            .filter(|bucket| bucket.count() > 0)
            .map(|bucket| Bucket {
                value: midpoint(bucket.range()) as f64 / SCALE,
                count: bucket.count(),
            })
            .collect::<Vec<_>>();
        Distribution {
            total: self.total(),
            buckets,
        }
    }
}

impl HistogramFn for Histogram {
    fn record(&self, value: f64) {
        Histogram::record(self, value)
    }
}

fn midpoint(range: RangeInclusive<u64>) -> u64 {
    let size = range.end() - range.start();
    range.start() + size / 2
}

/// A histogram bucket
#[derive(Debug, PartialEq, Copy, Clone)]
pub(crate) struct Bucket {
    /// Value is the midpoint of the bucket, unscaled
    pub value: f64,
    /// Counts of entries within the bucket
    pub count: u64,
}

/// One cycle's worth of a histogram.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Distribution {
    pub total: u64,
    pub buckets: Vec<Bucket>,
}

const PERCENTILES: [(AggregationKey, f64); 6] = [
    (AggregationKey::Median, 0.5),
    (AggregationKey::P75, 0.75),
    (AggregationKey::P95, 0.95),
    (AggregationKey::P98, 0.98),
    (AggregationKey::P99, 0.99),
    (AggregationKey::P999, 0.999),
];

impl Distribution {
    /// Combines the distributions of several series into one.
    pub fn merge<'a>(parts: impl IntoIterator<Item = &'a Distribution>) -> Distribution {
        let mut total = 0;
        let mut buckets: Vec<Bucket> = Vec::new();
        for part in parts {
            total += part.total;
            buckets.extend_from_slice(&part.buckets);
        }
        buckets.sort_by(|a, b| a.value.total_cmp(&b.value));
        let mut merged: Vec<Bucket> = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            match merged.last_mut() {
                Some(last) if last.value == bucket.value => last.count += bucket.count,
                _ => merged.push(bucket),
            }
        }
        Distribution {
            total,
            buckets: merged,
        }
    }

    /// The histogram aggregations, with every value but the count multiplied by `scale`.
    ///
    /// When nothing was recorded this cycle only the count is reported.
    pub fn values(&self, scale: f64) -> Values {
        let mut values = Values::new();
        values.insert(AggregationKey::Count, self.total as f64);

        let count: u64 = self.buckets.iter().map(|b| b.count).sum();
        let (Some(first), Some(last)) = (self.buckets.first(), self.buckets.last()) else {
            return values;
        };
        let n = count as f64;
        let mean = self
            .buckets
            .iter()
            .map(|b| b.value * b.count as f64)
            .sum::<f64>()
            / n;
        let variance = self
            .buckets
            .iter()
            .map(|b| (b.value - mean).powi(2) * b.count as f64)
            .sum::<f64>()
            / n;

        values.insert(AggregationKey::Min, first.value * scale);
        values.insert(AggregationKey::Max, last.value * scale);
        values.insert(AggregationKey::Mean, mean * scale);
        values.insert(AggregationKey::StdDev, variance.sqrt() * scale);
        for (key, quantile) in PERCENTILES {
            values.insert(key, self.quantile(count, quantile) * scale);
        }
        values
    }

    // nearest-rank over the bucket midpoints
    fn quantile(&self, count: u64, quantile: f64) -> f64 {
        let rank = ((quantile * count as f64).ceil() as u64).max(1);
        let mut seen = 0;
        for bucket in &self.buckets {
            seen += bucket.count;
            if seen >= rank {
                return bucket.value;
            }
        }
        self.buckets.last().map_or(0.0, |b| b.value)
    }
}
