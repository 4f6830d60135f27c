// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use derive_where::derive_where;
use futures::future::{Either, select};
use sfx_reporter_core::{ConfigError, MetricRegistry, TimeSource};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::ReportingConfig;
use crate::cycle::{CycleReport, ReportCycle};
use crate::transport::{HttpTransport, Transport};

/// A handle to a running reporter. This struct is mainly used to synchronize shutdown of the
/// reporter to ensure the last metrics are sent on shutdown.
///
/// Shutdown only occurs when called explicitly (via the [`shutdown`] function). Dropping the
/// `Reporter` will not wait for a final cycle.
///
/// This may be freely cloned.
///
/// # Examples
///
/// ```no_run
/// use sfx_reporter::{Reporter, ReportingConfig};
/// use sfx_reporter_metricsrs::MetricRecorder;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let recorder = MetricRecorder::new();
/// recorder.install()?;
///
/// let config = ReportingConfig::builder()
///     .api_token("my-token")
///     .source("checkout-service")
///     .default_dimension("environment", "prod")
///     .build()?;
/// let reporter = Reporter::builder().config(config).registry(recorder).build()?;
///
/// // ... run the application ...
///
/// reporter.shutdown().await;
/// # Ok(())
/// # }
/// ```
///
/// [`shutdown`]: Reporter::shutdown
#[derive_where(Clone)]
pub struct Reporter<R, T = HttpTransport> {
    tasks: TaskTracker,
    cancellation_token: CancellationToken,
    shared: Arc<Shared<R, T>>,
}

struct Shared<R, T> {
    cycle: ReportCycle<T>,
    registry: R,
    // held for the duration of a cycle so cycles never overlap
    running: Mutex<()>,
}

impl<R: MetricRegistry, T: Transport> Shared<R, T> {
    async fn run_cycle(&self) -> CycleReport {
        let _running = self.running.lock().await;
        self.cycle.run(&self.registry).await
    }
}

/// Spawns the task that runs one cycle per `publish_interval` until `shutdown_signal` fires,
/// then one final cycle.
fn spawn_reporter<R, T>(
    tracker: &TaskTracker,
    shared: Arc<Shared<R, T>>,
    publish_interval: Duration,
    shutdown_signal: CancellationToken,
) where
    R: MetricRegistry + Send + Sync + 'static,
    T: Transport + 'static,
{
    tracker.spawn(async move {
        let mut interval =
            tokio::time::interval_at(Instant::now() + publish_interval, publish_interval);
        // a tick that comes due while a cycle is still sending is dropped
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // We want to wait for either:
        // 1. the next tick
        // 2. The shutdown sequence to start.
        // If the shutdown sequence is starting `Either::Right` is returned and we exit the loop.
        while let Either::Left(_tick) =
            select(pin!(interval.tick()), pin!(shutdown_signal.cancelled())).await
        {
            shared.run_cycle().await;
        }
        tracing::info!("reporter shutting down, sending final metrics");
        let report = shared.run_cycle().await;
        if !report.is_complete() {
            tracing::warn!(
                failed_batches = report.failed().count(),
                "final reporting cycle did not deliver every batch"
            );
        }
    });
}

/// Marker type to ensure that a registry is always set.
///
/// You cannot build a [`Reporter`] without providing a registry:
///
/// ```compile_fail
/// use sfx_reporter::{Reporter, ReportingConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ReportingConfig::builder()
///     .api_token("my-token")
///     .source("checkout-service")
///     .build()?;
/// let reporter = Reporter::builder().config(config).build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Debug)]
#[non_exhaustive]
pub struct YouMustConfigureARegistry;

/// Builder for [`Reporter`]
///
/// [`Reporter`] must be built within the context of a Tokio runtime.
#[derive(Debug)]
pub struct ReporterBuilder<R = YouMustConfigureARegistry> {
    config: Option<ReportingConfig>,
    registry: R,
    time_source: TimeSource,
}

impl Default for ReporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReporterBuilder {
    /// Initialize the builder.
    ///
    /// You must call [`Self::config`] and [`Self::registry`] before building.
    pub fn new() -> Self {
        Self {
            config: None,
            registry: YouMustConfigureARegistry,
            time_source: TimeSource::System,
        }
    }
}

impl<R> ReporterBuilder<R> {
    /// Set the validated configuration to report with.
    pub fn config(mut self, config: ReportingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the registry to report.
    pub fn registry<R2: MetricRegistry>(self, registry: R2) -> ReporterBuilder<R2> {
        ReporterBuilder {
            config: self.config,
            registry,
            time_source: self.time_source,
        }
    }

    /// Change where cycle timestamps are read from. Defaults to the system clock.
    pub fn time_source(mut self, time_source: TimeSource) -> Self {
        self.time_source = time_source;
        self
    }
}

impl<R: MetricRegistry + Send + Sync + 'static> ReporterBuilder<R> {
    /// Builds a reporter that sends over HTTP and starts its reporting task.
    pub fn build(self) -> Result<Reporter<R>, ConfigError> {
        let config = self.required_config()?;
        let transport = HttpTransport::new(config.http_timeout())?;
        Ok(Reporter::new(config, self.registry, transport, self.time_source))
    }

    /// Builds a reporter that sends through `transport` and starts its reporting task.
    pub fn build_with_transport<T: Transport + 'static>(
        self,
        transport: T,
    ) -> Result<Reporter<R, T>, ConfigError> {
        let config = self.required_config()?;
        Ok(Reporter::new(config, self.registry, transport, self.time_source))
    }

    fn required_config(&self) -> Result<ReportingConfig, ConfigError> {
        self.config
            .clone()
            .ok_or_else(|| ConfigError::invalid("a reporting configuration is required"))
    }
}

impl Reporter<YouMustConfigureARegistry> {
    /// Creates a [builder](crate::ReporterBuilder) for [`Reporter`]
    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::new()
    }
}

impl<R, T> Reporter<R, T>
where
    R: MetricRegistry + Send + Sync + 'static,
    T: Transport + 'static,
{
    fn new(config: ReportingConfig, registry: R, transport: T, time_source: TimeSource) -> Self {
        let tracker = TaskTracker::new();
        let cancellation = CancellationToken::new();
        let publish_interval = config.publish_interval();
        tracing::info!(
            interval = ?publish_interval,
            endpoint = config.base_uri(),
            source = config.source(),
            "starting metrics reporter"
        );

        let shared = Arc::new(Shared {
            cycle: ReportCycle::new(Arc::new(config), transport, time_source),
            registry,
            running: Mutex::new(()),
        });
        spawn_reporter(
            &tracker,
            shared.clone(),
            publish_interval,
            cancellation.clone(),
        );
        tracker.close();

        Self {
            tasks: tracker,
            cancellation_token: cancellation,
            shared,
        }
    }

    /// Runs one reporting cycle now, on the calling task.
    ///
    /// Waits for a cycle that is already in progress to finish first.
    pub async fn report_now(&self) -> CycleReport {
        self.shared.run_cycle().await
    }

    /// Shuts down the reporter, running a final cycle and waiting for it to complete.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.tasks.wait().await
    }

    /// The configuration this reporter runs with.
    pub fn config(&self) -> &ReportingConfig {
        self.shared.cycle.config()
    }
}
