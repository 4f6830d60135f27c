// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use metrics_024::{counter, gauge, with_local_recorder};
use serde_json::Value;
use sfx_reporter::{
    Reporter, ReportingConfig, TimeSource, Transport, TransportError, TransportResponse,
    WireFormat,
};
use sfx_reporter_core::MetricSnapshot;
use sfx_reporter_core::time::fakes::StaticTimeSource;
use sfx_reporter_metricsrs::MetricRecorder;

/// Accepts every request and keeps the decoded bodies.
#[derive(Debug, Clone, Default)]
struct Recording(Arc<Mutex<Vec<Value>>>);

impl Recording {
    fn bodies(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }
}

impl Transport for Recording {
    async fn post(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: Vec<u8>,
    ) -> Result<TransportResponse, TransportError> {
        assert_eq!(url, "https://ingest.example.com/v2/datapoint");
        assert!(headers.contains(&("X-SF-TOKEN", "token".to_owned())));
        self.0
            .lock()
            .unwrap()
            .push(serde_json::from_slice(&body).unwrap());
        Ok(TransportResponse {
            status: 200,
            body: String::new(),
        })
    }
}

fn config() -> ReportingConfig {
    ReportingConfig::builder()
        .api_token("token")
        .base_uri("https://ingest.example.com")
        .source("host1")
        .publish_interval(Duration::from_secs(10))
        .wire_format(WireFormat::Json)
        .build()
        .unwrap()
}

fn reporter(recorder: MetricRecorder, transport: Recording) -> Reporter<MetricRecorder, Recording> {
    Reporter::builder()
        .config(config())
        .registry(recorder)
        .time_source(TimeSource::custom(StaticTimeSource::at_time(
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )))
        .build_with_transport(transport)
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn reports_every_interval_and_on_shutdown() {
    let recorder = MetricRecorder::new();
    with_local_recorder(&recorder, || counter!("requests").increment(3));
    let transport = Recording::default();
    let reporter = reporter(recorder.clone(), transport.clone());

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(transport.bodies().is_empty());

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(transport.bodies().len(), 2);

    with_local_recorder(&recorder, || counter!("requests").increment(2));
    reporter.shutdown().await;

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 3);
    let counts: Vec<_> = bodies
        .iter()
        .map(|b| b["cumulative_counter"][0]["value"].clone())
        .collect();
    assert_eq!(counts, [3, 3, 5]);
    assert_eq!(bodies[2]["cumulative_counter"][0]["metric"], "requests");
    assert_eq!(bodies[2]["cumulative_counter"][0]["dimensions"]["source"], "host1");
    assert_eq!(
        bodies[2]["cumulative_counter"][0]["timestamp"],
        1_700_000_000_000u64
    );
}

#[tokio::test(start_paused = true)]
async fn report_now_runs_a_cycle_immediately() {
    let recorder = MetricRecorder::new();
    with_local_recorder(&recorder, || gauge!("queue.depth").set(7.0));
    let transport = Recording::default();
    let reporter = reporter(recorder, transport.clone());

    let report = reporter.report_now().await;
    assert!(report.is_complete());
    assert_eq!(report.sent(), 1);

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["gauge"][0]["metric"], "queue.depth");
    assert_eq!(bodies[0]["gauge"][0]["value"], 7.0);

    reporter.shutdown().await;
    assert_eq!(transport.bodies().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn clones_share_one_reporting_task() {
    let transport = Recording::default();
    let reporter = reporter(MetricRecorder::new(), transport.clone());
    let clone = reporter.clone();

    // an empty registry produces no requests
    tokio::time::sleep(Duration::from_secs(30)).await;
    clone.shutdown().await;
    reporter.shutdown().await;
    assert!(transport.bodies().is_empty());
    assert_eq!(reporter.config().source(), "host1");
}

#[test]
fn building_without_config_fails() {
    let result = Reporter::builder()
        .registry(Vec::<MetricSnapshot>::new())
        .build();
    let err = result.err().unwrap();
    assert_eq!(err.reasons(), ["a reporting configuration is required"]);
}
