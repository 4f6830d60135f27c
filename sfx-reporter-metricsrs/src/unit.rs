// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use metrics_024::Unit;
use sfx_reporter_core::MetricKind;

/// How a described histogram is reported: its kind, and the factor that converts
/// recorded values into the reported unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HistogramShape {
    pub kind: MetricKind,
    pub scale: f64,
}

/// Counters described as a per-second count are meters, everything else is a plain counter.
pub(crate) fn counter_kind(unit: Option<Unit>) -> MetricKind {
    match unit {
        Some(Unit::CountPerSecond) => MetricKind::Meter,
        _ => MetricKind::Counter,
    }
}

/// Histograms of durations are timers, reported in milliseconds.
pub(crate) fn histogram_shape(unit: Option<Unit>) -> HistogramShape {
    let timer = |scale| HistogramShape {
        kind: MetricKind::Timer,
        scale,
    };
    match unit {
        Some(Unit::Seconds) => timer(1e3),
        Some(Unit::Milliseconds) => timer(1.0),
        Some(Unit::Microseconds) => timer(1e-3),
        Some(Unit::Nanoseconds) => timer(1e-6),
        _ => HistogramShape {
            kind: MetricKind::Histogram,
            scale: 1.0,
        },
    }
}
