// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The body of a `POST /v2/datapoint` request.
//!
//! Two encodings are supported, chosen with [`WireFormat`]. The protocol buffer encoding is
//! the default. The JSON encoding groups datapoints by metric type:
//!
//! ```json
//! {
//!   "gauge": [
//!     {"metric": "api.use.mean", "value": 2.5, "dimensions": {"source": "host1"}, "timestamp": 1700000000000}
//!   ],
//!   "cumulative_counter": [
//!     {"metric": "api.use.count", "value": 5, "dimensions": {"source": "host1"}, "timestamp": 1700000000000}
//!   ]
//! }
//! ```
//!
//! Empty groups are left out. JSON has no representation for non-finite numbers, so they are
//! written as `null`, which the endpoint may refuse for the whole request. The protocol buffer
//! encoding carries them unchanged.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use sfx_reporter_core::{Batch, Datapoint, MetricType, MetricValue};

/// How request bodies are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `application/x-protobuf`, see [`proto`].
    #[default]
    Protobuf,
    /// `application/json`.
    Json,
}

impl WireFormat {
    /// The `Content-Type` header sent with bodies of this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Protobuf => "application/x-protobuf",
            Self::Json => "application/json",
        }
    }

    /// Serializes one batch, keeping datapoint order.
    pub fn encode(self, batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Protobuf => Ok(encode_protobuf(batch)),
            Self::Json => encode_json(batch),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct Body<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    gauge: Vec<Record<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    counter: Vec<Record<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cumulative_counter: Vec<Record<'a>>,
}

#[derive(Debug, Serialize)]
struct Record<'a> {
    metric: &'a str,
    value: Value,
    dimensions: &'a BTreeMap<String, String>,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Value {
    Integer(i64),
    Float(f64),
}

impl From<MetricValue> for Value {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Integer(v) => Self::Integer(v),
            MetricValue::Float(v) => Self::Float(v),
        }
    }
}

impl<'a> From<&'a Datapoint> for Record<'a> {
    fn from(datapoint: &'a Datapoint) -> Self {
        Self {
            metric: datapoint.metric(),
            value: datapoint.value().into(),
            dimensions: datapoint.labels().as_map(),
            timestamp: millis_since_epoch(datapoint.timestamp()),
        }
    }
}

/// Milliseconds since the Unix epoch, clamped to 0 for earlier times.
pub fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis().try_into().unwrap_or(u64::MAX))
}

/// Serializes one batch as JSON, keeping datapoint order within each group.
pub fn encode_json(batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
    let mut body = Body::default();
    for datapoint in batch {
        let group = match datapoint.metric_type() {
            MetricType::Gauge => &mut body.gauge,
            MetricType::Counter => &mut body.counter,
            MetricType::CumulativeCounter => &mut body.cumulative_counter,
        };
        group.push(Record::from(datapoint));
    }
    serde_json::to_vec(&body)
}

/// Serializes one batch as a [`proto::DataPointUploadMessage`].
pub fn encode_protobuf(batch: &Batch) -> Vec<u8> {
    proto::DataPointUploadMessage::from(batch).encode_to_vec()
}

/// Messages of the SignalFx protocol buffer upload format.
///
/// Field numbers match `signal_fx_protocol_buffers.proto`. Every field is written, including
/// default values.
pub mod proto {
    use super::{Batch, Datapoint, MetricValue, millis_since_epoch};

    /// A request body.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct DataPointUploadMessage {
        /// The datapoints of one batch.
        #[prost(message, repeated, tag = "1")]
        pub datapoints: Vec<DataPoint>,
    }

    /// One datapoint.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct DataPoint {
        /// Unused. The source travels as a dimension.
        #[prost(string, optional, tag = "1")]
        pub source: Option<String>,
        /// The metric name.
        #[prost(string, optional, tag = "2")]
        pub metric: Option<String>,
        /// Milliseconds since the Unix epoch.
        #[prost(int64, optional, tag = "3")]
        pub timestamp: Option<i64>,
        /// The reading.
        #[prost(message, optional, tag = "4")]
        pub value: Option<Datum>,
        /// A [`MetricType`] value.
        #[prost(enumeration = "MetricType", optional, tag = "5")]
        pub metric_type: Option<i32>,
        /// The datapoint's dimensions, ordered by key.
        #[prost(message, repeated, tag = "6")]
        pub dimensions: Vec<Dimension>,
    }

    /// A value. Exactly one field is set.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Datum {
        /// A string value. Never written by this crate.
        #[prost(string, optional, tag = "1")]
        pub str_value: Option<String>,
        /// A floating point value.
        #[prost(double, optional, tag = "2")]
        pub double_value: Option<f64>,
        /// An integer value.
        #[prost(int64, optional, tag = "3")]
        pub int_value: Option<i64>,
    }

    /// One dimension.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Dimension {
        /// The dimension name.
        #[prost(string, optional, tag = "1")]
        pub key: Option<String>,
        /// The dimension value.
        #[prost(string, optional, tag = "2")]
        pub value: Option<String>,
    }

    /// How the endpoint interprets a datapoint's value over time.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum MetricType {
        /// A point-in-time reading.
        Gauge = 0,
        /// Events since the previous report.
        Counter = 1,
        /// A string-valued reading. Never written by this crate.
        Enum = 2,
        /// A running total.
        CumulativeCounter = 3,
    }

    impl From<sfx_reporter_core::MetricType> for MetricType {
        fn from(metric_type: sfx_reporter_core::MetricType) -> Self {
            match metric_type {
                sfx_reporter_core::MetricType::Gauge => Self::Gauge,
                sfx_reporter_core::MetricType::Counter => Self::Counter,
                sfx_reporter_core::MetricType::CumulativeCounter => Self::CumulativeCounter,
            }
        }
    }

    impl From<MetricValue> for Datum {
        fn from(value: MetricValue) -> Self {
            match value {
                MetricValue::Integer(v) => Self {
                    int_value: Some(v),
                    ..Default::default()
                },
                MetricValue::Float(v) => Self {
                    double_value: Some(v),
                    ..Default::default()
                },
            }
        }
    }

    impl From<&Datapoint> for DataPoint {
        fn from(datapoint: &Datapoint) -> Self {
            Self {
                source: None,
                metric: Some(datapoint.metric().to_owned()),
                timestamp: Some(
                    millis_since_epoch(datapoint.timestamp())
                        .try_into()
                        .unwrap_or(i64::MAX),
                ),
                value: Some(datapoint.value().into()),
                metric_type: Some(MetricType::from(datapoint.metric_type()) as i32),
                dimensions: datapoint
                    .labels()
                    .iter()
                    .map(|(key, value)| Dimension {
                        key: Some(key.to_owned()),
                        value: Some(value.to_owned()),
                    })
                    .collect(),
            }
        }
    }

    impl From<&Batch> for DataPointUploadMessage {
        fn from(batch: &Batch) -> Self {
            Self {
                datapoints: batch.into_iter().map(DataPoint::from).collect(),
            }
        }
    }
}
