// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use crate::LabelSet;

/// The numeric value of a [`Datapoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// A count of events.
    Integer(i64),
    /// Any other reading. NaN is passed through as-is.
    Float(f64),
}

impl MetricValue {
    /// The value as a float, whichever way it is stored.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// How the ingestion endpoint should interpret a datapoint's value over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricType {
    /// A point-in-time reading.
    Gauge,
    /// The number of events since the previous report.
    ///
    /// Translation never produces this type, since registries report running totals. It is
    /// available to callers that build their own datapoints from per-interval deltas.
    Counter,
    /// A running total that only ever goes up.
    CumulativeCounter,
}

/// One measurement destined for the ingestion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    metric: String,
    value: MetricValue,
    labels: LabelSet,
    timestamp: SystemTime,
    metric_type: MetricType,
}

impl Datapoint {
    /// Creates a datapoint.
    pub fn new(
        metric: impl Into<String>,
        value: MetricValue,
        labels: LabelSet,
        timestamp: SystemTime,
        metric_type: MetricType,
    ) -> Self {
        Self {
            metric: metric.into(),
            value,
            labels,
            timestamp,
            metric_type,
        }
    }

    /// The metric name, including any aggregation suffix.
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// The measured value.
    pub fn value(&self) -> MetricValue {
        self.value
    }

    /// The labels attached to this datapoint.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// When the registry snapshot this datapoint came from was taken.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// How the value should be interpreted.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }
}
