// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! One reporting cycle: snapshot, translate, batch, send.

use std::sync::Arc;
use std::time::SystemTime;

use sfx_reporter_core::{LabelSet, MetricRegistry, TimeSource, batch, dimensions, translate};

use crate::ReportingConfig;
use crate::transmit::{TransmitError, Transmitter};
use crate::transport::Transport;

/// The fate of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Number of datapoints in the batch.
    pub size: usize,
    /// How many were accepted, or why none were.
    pub result: Result<usize, TransmitError>,
}

/// What happened during one cycle, in batch order.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The timestamp shared by every datapoint of the cycle.
    pub timestamp: SystemTime,
    /// One entry per batch, in the order they were sent.
    pub outcomes: Vec<BatchOutcome>,
}

impl CycleReport {
    /// Total datapoints produced by the cycle.
    pub fn datapoints(&self) -> usize {
        self.outcomes.iter().map(|o| o.size).sum()
    }

    /// Datapoints accepted by the endpoint.
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }

    /// The batches that were not delivered.
    pub fn failed(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Whether every batch was delivered.
    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Runs reporting cycles against one configuration.
///
/// The base labels (default dimensions plus source) are merged once, when the cycle is
/// created.
#[derive(Debug)]
pub struct ReportCycle<T> {
    config: Arc<ReportingConfig>,
    transmitter: Transmitter<T>,
    time_source: TimeSource,
    base_labels: LabelSet,
}

impl<T: Transport> ReportCycle<T> {
    /// Creates a cycle that reads the time from `time_source` and sends through `transport`.
    pub fn new(config: Arc<ReportingConfig>, transport: T, time_source: TimeSource) -> Self {
        let base_labels =
            dimensions::merge(config.default_dimensions(), config.source(), &[] as &[&str]);
        Self {
            transmitter: Transmitter::new(&config, transport),
            config,
            time_source,
            base_labels,
        }
    }

    /// The configuration this cycle reports with.
    pub fn config(&self) -> &ReportingConfig {
        &self.config
    }

    /// Reports the current state of `registry`.
    ///
    /// Every batch is attempted, in order, whatever happened to the previous ones.
    pub async fn run<R: MetricRegistry + ?Sized>(&self, registry: &R) -> CycleReport {
        let timestamp = self.time_source.now();
        tracing::trace!("starting reporting cycle");

        let snapshots = registry.snapshot();
        let datapoints = translate::translate_all(
            &snapshots,
            &self.base_labels,
            timestamp,
            self.config.detail_set(),
        );
        let batches = match batch::chunk(datapoints, self.config.max_datapoints_per_message()) {
            Ok(batches) => batches,
            Err(error) => {
                tracing::error!(%error, "cannot split datapoints into batches");
                return CycleReport {
                    timestamp,
                    outcomes: Vec::new(),
                };
            }
        };

        let mut outcomes = Vec::with_capacity(batches.len());
        for (index, batch) in batches.iter().enumerate() {
            let result = self.transmitter.send(batch).await;
            match &result {
                Ok(_) => {}
                Err(error @ TransmitError::Unavailable(_)) => {
                    tracing::warn!(batch = index, size = batch.len(), %error, "batch not delivered");
                }
                Err(error @ TransmitError::Rejected { .. }) => {
                    tracing::error!(batch = index, size = batch.len(), %error, "batch rejected");
                }
            }
            outcomes.push(BatchOutcome {
                size: batch.len(),
                result,
            });
        }

        let report = CycleReport {
            timestamp,
            outcomes,
        };
        tracing::debug!(
            metrics = snapshots.len(),
            datapoints = report.datapoints(),
            batches = report.outcomes.len(),
            sent = report.sent(),
            "reporting cycle finished"
        );
        report
    }
}
