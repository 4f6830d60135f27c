// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Records a few metrics for a minute and reports them.
//!
//! ```text
//! RUST_LOG=sfx_reporter=debug cargo run --example report -- reporter.toml
//! ```

use std::time::Duration;

use metrics_024::{Unit, counter, describe_counter, describe_histogram, gauge, histogram};
use sfx_reporter::{AwsMetadataClient, Reporter, ReporterSettings, SystemHostNames};
use sfx_reporter_metricsrs::MetricRecorder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "reporter.toml".to_owned());
    let config = ReporterSettings::load(&path)?
        .resolve(&SystemHostNames, &AwsMetadataClient::new()?)
        .await?;

    let recorder = MetricRecorder::new();
    recorder.install()?;
    describe_histogram!("api.use", Unit::Seconds, "time spent serving a request");
    describe_counter!("api.calls", Unit::CountPerSecond, "requests served");

    let reporter = Reporter::builder()
        .config(config)
        .registry(recorder)
        .build()?;

    for i in 0..600u64 {
        let api_type = if i % 4 == 0 { "logout" } else { "login" };
        counter!("api.calls", "api_type" => api_type).increment(1);
        histogram!("api.use").record(0.01 + (i % 10) as f64 / 100.0);
        gauge!("queue.depth").set((i % 25) as f64);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    reporter.shutdown().await;
    Ok(())
}
