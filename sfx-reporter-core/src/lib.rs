// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::aggregation::{AggregationKey, DetailSet, MetricKind, UnknownAggregationKey, Values};
pub use crate::batch::{Batch, MAX_DATAPOINTS_PER_MESSAGE};
pub use crate::datapoint::{Datapoint, MetricType, MetricValue};
pub use crate::dimensions::{LabelSet, SOURCE_KEY};
pub use crate::error::{ConfigError, ConfigErrorBuilder};
pub use crate::snapshot::{ItemSnapshot, MetricRegistry, MetricSnapshot};
pub use crate::time::{Time, TimeSource};

pub mod aggregation;
pub mod batch;
mod datapoint;
pub mod dimensions;
mod error;
mod snapshot;
pub mod time;
pub mod translate;
