// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::{AggregationKey, MetricKind, Values};

/// The state of one registered metric at the start of a reporting cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    name: String,
    kind: MetricKind,
    values: Values,
    items: Vec<ItemSnapshot>,
}

impl MetricSnapshot {
    /// Creates a snapshot with no values.
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            values: Values::new(),
            items: Vec::new(),
        }
    }

    /// Sets the value of one aggregation.
    pub fn with_value(mut self, key: AggregationKey, value: f64) -> Self {
        self.values.insert(key, value);
        self
    }

    /// Replaces all aggregation values.
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// Appends an item sub-series. Items are reported in the order they are added.
    pub fn with_item(mut self, item: ItemSnapshot) -> Self {
        self.items.push(item);
        self
    }

    /// The dot-delimited metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of metric.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// The aggregated values of the metric as a whole.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// The tagged sub-series of this metric, in registration order.
    pub fn items(&self) -> &[ItemSnapshot] {
        &self.items
    }
}

/// One sub-series of a tagged metric, e.g. the share of an API counter that came from logins.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    labels: Vec<String>,
    values: Values,
}

impl ItemSnapshot {
    /// Creates an item from its `key=value` labels.
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            values: Values::new(),
        }
    }

    /// Sets the value of one aggregation.
    pub fn with_value(mut self, key: AggregationKey, value: f64) -> Self {
        self.values.insert(key, value);
        self
    }

    /// Replaces all aggregation values.
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// The item labels, in the order they were attached.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The aggregated values of this sub-series.
    pub fn values(&self) -> &Values {
        &self.values
    }
}

/// A source of metric snapshots.
///
/// `snapshot` is called exactly once per reporting cycle and the result is treated as
/// immutable for the rest of the cycle. Metrics are reported in the order they are returned.
pub trait MetricRegistry {
    /// Reads the current state of every registered metric.
    fn snapshot(&self) -> Vec<MetricSnapshot>;
}

impl<R: MetricRegistry + ?Sized> MetricRegistry for &R {
    fn snapshot(&self) -> Vec<MetricSnapshot> {
        (**self).snapshot()
    }
}

impl<R: MetricRegistry + ?Sized> MetricRegistry for Arc<R> {
    fn snapshot(&self) -> Vec<MetricSnapshot> {
        (**self).snapshot()
    }
}

/// A fixed set of snapshots, mostly useful for tests.
impl MetricRegistry for Vec<MetricSnapshot> {
    fn snapshot(&self) -> Vec<MetricSnapshot> {
        self.clone()
    }
}
