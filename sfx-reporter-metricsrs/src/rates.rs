// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Event rates derived from cumulative counts.
//!
//! Each series remembers the count it had when it was first seen and at the previous
//! snapshot. Moving averages decay with the real time elapsed between snapshots, so a
//! late or skipped cycle does not skew them.

use std::time::{Duration, SystemTime};

use sfx_reporter_core::{AggregationKey, Values};

const WINDOWS: [(AggregationKey, Duration); 3] = [
    (AggregationKey::Rate1m, Duration::from_secs(60)),
    (AggregationKey::Rate5m, Duration::from_secs(5 * 60)),
    (AggregationKey::Rate15m, Duration::from_secs(15 * 60)),
];

/// An exponentially weighted moving average of events per second.
#[derive(Debug, Clone, Copy)]
struct Ewma {
    window: Duration,
    rate: Option<f64>,
}

impl Ewma {
    fn new(window: Duration) -> Self {
        Self { window, rate: None }
    }

    fn update(&mut self, instant_rate: f64, elapsed: Duration) {
        let alpha = 1.0 - (-elapsed.as_secs_f64() / self.window.as_secs_f64()).exp();
        self.rate = Some(match self.rate {
            None => instant_rate,
            Some(rate) => rate + alpha * (instant_rate - rate),
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    at: SystemTime,
    count: u64,
}

/// Rate bookkeeping for one counter series.
#[derive(Debug)]
pub(crate) struct RateState {
    first: Observation,
    last: Observation,
    averages: [Ewma; 3],
}

impl RateState {
    pub(crate) fn new(at: SystemTime, count: u64) -> Self {
        let observation = Observation { at, count };
        Self {
            first: observation,
            last: observation,
            averages: WINDOWS.map(|(_, window)| Ewma::new(window)),
        }
    }

    /// Folds in the count read at `at` and returns the current rates.
    ///
    /// Nothing is returned until time has passed since the series was first seen.
    pub(crate) fn observe(&mut self, at: SystemTime, count: u64) -> Values {
        if let Ok(elapsed) = at.duration_since(self.last.at)
            && !elapsed.is_zero()
        {
            let delta = count.saturating_sub(self.last.count) as f64;
            let instant_rate = delta / elapsed.as_secs_f64();
            for average in &mut self.averages {
                average.update(instant_rate, elapsed);
            }
            self.last = Observation { at, count };
        }
        self.values()
    }

    fn values(&self) -> Values {
        let mut values = Values::new();
        let Ok(lifetime) = self.last.at.duration_since(self.first.at) else {
            return values;
        };
        if lifetime.is_zero() {
            return values;
        }
        let total = self.last.count.saturating_sub(self.first.count) as f64;
        values.insert(AggregationKey::RateMean, total / lifetime.as_secs_f64());
        for ((key, _), average) in WINDOWS.iter().zip(&self.averages) {
            if let Some(rate) = average.rate {
                values.insert(*key, rate);
            }
        }
        values
    }
}
