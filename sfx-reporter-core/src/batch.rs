// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Splitting a cycle's datapoints into size-bounded batches.

use std::mem;

use crate::{ConfigError, Datapoint};

/// The largest number of datapoints the ingestion endpoint accepts in one message.
pub const MAX_DATAPOINTS_PER_MESSAGE: usize = 10_000;

/// An ordered group of datapoints sent in one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch(Vec<Datapoint>);

impl Batch {
    /// Number of datapoints in the batch.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the batch is empty. [`chunk`] never produces empty batches.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The datapoints, in order.
    pub fn datapoints(&self) -> &[Datapoint] {
        &self.0
    }

    /// Takes the datapoints out of the batch.
    pub fn into_datapoints(self) -> Vec<Datapoint> {
        self.0
    }
}

impl From<Vec<Datapoint>> for Batch {
    fn from(datapoints: Vec<Datapoint>) -> Self {
        Self(datapoints)
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Datapoint;
    type IntoIter = std::slice::Iter<'a, Datapoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Partitions `datapoints` into batches of at most `max_size`, preserving order.
///
/// Every batch but the last is full. An empty input yields no batches.
pub fn chunk(datapoints: Vec<Datapoint>, max_size: usize) -> Result<Vec<Batch>, ConfigError> {
    if max_size < 1 {
        return Err(
            ConfigError::invalid("must be at least 1").for_field("max_datapoints_per_message")
        );
    }

    let mut batches = Vec::with_capacity(datapoints.len().div_ceil(max_size));
    let mut current = Vec::with_capacity(max_size.min(datapoints.len()));
    for datapoint in datapoints {
        if current.len() == max_size {
            batches.push(Batch(mem::replace(
                &mut current,
                Vec::with_capacity(max_size),
            )));
        }
        current.push(datapoint);
    }
    if !current.is_empty() {
        batches.push(Batch(current));
    }
    Ok(batches)
}
