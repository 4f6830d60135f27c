// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, UNIX_EPOCH};

use assert_approx_eq::assert_approx_eq;
use metrics_024::{Unit, counter, describe_counter, describe_histogram, histogram, with_local_recorder};
use sfx_reporter_core::AggregationKey::*;
use sfx_reporter_core::time::fakes::ManuallyAdvancedTimeSource;
use sfx_reporter_core::{
    DetailSet, LabelSet, MetricKind, MetricRegistry, MetricSnapshot, MetricType, MetricValue,
    TimeSource, dimensions, translate,
};
use sfx_reporter_metricsrs::MetricRecorder;

fn find(snapshots: Vec<MetricSnapshot>, name: &str) -> MetricSnapshot {
    snapshots
        .into_iter()
        .find(|s| s.name() == name)
        .unwrap_or_else(|| panic!("no metric named {name}"))
}

#[test]
fn timer_reports_milliseconds_and_rates() {
    let clock = ManuallyAdvancedTimeSource::at_time(UNIX_EPOCH + Duration::from_secs(1_000));
    let recorder = MetricRecorder::with_time_source(TimeSource::custom(clock.clone()));
    with_local_recorder(&recorder, || {
        describe_histogram!("api.use", Unit::Seconds, "time spent in the API");
        histogram!("api.use").record(0.5);
    });

    let first = find(recorder.snapshot(), "api.use");
    assert_eq!(first.kind(), MetricKind::Timer);
    assert_approx_eq!(first.values()[&Mean], 500.0, 5.0);
    assert!(!first.values().contains_key(&Rate1m));

    clock.advance(Duration::from_secs(10));
    with_local_recorder(&recorder, || {
        for _ in 0..20 {
            histogram!("api.use").record(0.002);
        }
    });
    let second = find(recorder.snapshot(), "api.use");
    assert_eq!(second.values()[&Count], 21.0);
    assert_approx_eq!(second.values()[&Max], 2.0, 0.05);
    assert_approx_eq!(second.values()[&RateMean], 2.0);
    assert_approx_eq!(second.values()[&Rate1m], 2.0);
}

#[test]
fn meter_items_share_and_rates() {
    let clock = ManuallyAdvancedTimeSource::at_time(UNIX_EPOCH);
    let recorder = MetricRecorder::with_time_source(TimeSource::custom(clock.clone()));
    with_local_recorder(&recorder, || {
        describe_counter!("requests", Unit::CountPerSecond, "requests served");
        counter!("requests", "status" => "ok").increment(0);
        counter!("requests", "status" => "error").increment(0);
    });
    recorder.snapshot();

    clock.advance(Duration::from_secs(60));
    with_local_recorder(&recorder, || {
        counter!("requests", "status" => "ok").increment(90);
        counter!("requests", "status" => "error").increment(30);
    });
    let requests = find(recorder.snapshot(), "requests");
    assert_eq!(requests.kind(), MetricKind::Meter);
    assert_eq!(requests.values()[&Count], 120.0);
    assert_approx_eq!(requests.values()[&Rate1m], 2.0);

    let items = requests.items();
    assert_eq!(items[0].labels(), ["status=error"]);
    assert_approx_eq!(items[0].values()[&Percent], 0.25);
    assert_approx_eq!(items[0].values()[&RateMean], 0.5);
    assert_eq!(items[1].labels(), ["status=ok"]);
    assert_approx_eq!(items[1].values()[&Rate15m], 1.5);
}

#[test]
fn snapshots_translate_into_datapoints() {
    let recorder = MetricRecorder::new();
    with_local_recorder(&recorder, || {
        counter!("api.calls", "api_type" => "login").increment(4);
        counter!("api.calls", "badlabel" => "").increment(1);
    });
    let base = dimensions::merge(&LabelSet::new(), "host1", &[] as &[&str]);
    let datapoints = translate::translate_all(
        &recorder.snapshot(),
        &base,
        UNIX_EPOCH,
        &DetailSet::default(),
    );

    let names: Vec<_> = datapoints.iter().map(|d| d.metric()).collect();
    assert_eq!(names, ["api.calls", "api.calls"]);
    assert_eq!(datapoints[0].value(), MetricValue::Integer(5));
    assert_eq!(datapoints[0].metric_type(), MetricType::CumulativeCounter);
    assert_eq!(datapoints[0].labels(), &base);
    assert_eq!(datapoints[1].value(), MetricValue::Integer(4));
    assert_eq!(datapoints[1].labels().get("api_type"), Some("login"));
    assert_eq!(datapoints[1].labels().get("source"), Some("host1"));
    // the `badlabel=""` series has no usable dimension and is not reported apart from the total
    assert!(datapoints.iter().all(|d| !d.labels().contains_key("badlabel")));
}
