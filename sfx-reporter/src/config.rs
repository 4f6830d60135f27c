// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Validated reporter configuration.

use std::time::Duration;

use reqwest::Url;
use sfx_reporter_core::{ConfigError, DetailSet, LabelSet, MAX_DATAPOINTS_PER_MESSAGE};

use crate::wire::WireFormat;

/// The ingestion endpoint used when none is configured.
pub const DEFAULT_BASE_URI: &str = "https://ingest.signalfx.com";
/// How often metrics are published when no interval is configured.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(10);
/// How long one HTTP request may take when no timeout is configured.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a reporter needs to know, checked once up front.
///
/// A `ReportingConfig` can only be obtained through [`ReportingConfigBuilder::build`] (or
/// [`ReporterSettings::resolve`](crate::ReporterSettings::resolve), which uses it), so every
/// instance satisfies the invariants documented on its accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingConfig {
    api_token: String,
    base_uri: String,
    max_datapoints_per_message: usize,
    default_dimensions: LabelSet,
    source: String,
    detail_set: DetailSet,
    publish_interval: Duration,
    http_timeout: Duration,
    wire_format: WireFormat,
}

impl ReportingConfig {
    /// Starts a configuration. `api_token` and `source` are required.
    pub fn builder() -> ReportingConfigBuilder {
        ReportingConfigBuilder::default()
    }

    /// The ingest API token, never empty.
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// The ingestion base URI, without a trailing slash.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// The full URL batches are posted to.
    pub fn datapoint_url(&self) -> String {
        format!("{}/v2/datapoint", self.base_uri)
    }

    /// Upper bound on datapoints per request, in `1..=10000`.
    pub fn max_datapoints_per_message(&self) -> usize {
        self.max_datapoints_per_message
    }

    /// Dimensions added to every datapoint.
    pub fn default_dimensions(&self) -> &LabelSet {
        &self.default_dimensions
    }

    /// The resolved source, never empty.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Which aggregations are reported.
    pub fn detail_set(&self) -> &DetailSet {
        &self.detail_set
    }

    /// Time between reporting cycles, at least one second.
    pub fn publish_interval(&self) -> Duration {
        self.publish_interval
    }

    /// Timeout of one HTTP request.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// How request bodies are encoded.
    pub fn wire_format(&self) -> WireFormat {
        self.wire_format
    }
}

/// Builder for [`ReportingConfig`].
#[derive(Debug, Clone)]
pub struct ReportingConfigBuilder {
    api_token: Option<String>,
    base_uri: String,
    max_datapoints_per_message: usize,
    default_dimensions: LabelSet,
    source: Option<String>,
    detail_set: DetailSet,
    publish_interval: Duration,
    http_timeout: Duration,
    wire_format: WireFormat,
}

impl Default for ReportingConfigBuilder {
    fn default() -> Self {
        Self {
            api_token: None,
            base_uri: DEFAULT_BASE_URI.to_owned(),
            max_datapoints_per_message: MAX_DATAPOINTS_PER_MESSAGE,
            default_dimensions: LabelSet::new(),
            source: None,
            detail_set: DetailSet::default(),
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            wire_format: WireFormat::default(),
        }
    }
}

impl ReportingConfigBuilder {
    /// Set the ingest API token.
    pub fn api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Set the ingestion base URI.
    ///
    /// Defaults to [`DEFAULT_BASE_URI`].
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Set the largest number of datapoints sent per request.
    ///
    /// Defaults to [`MAX_DATAPOINTS_PER_MESSAGE`], which is also the highest allowed value.
    pub fn max_datapoints_per_message(mut self, max: usize) -> Self {
        self.max_datapoints_per_message = max;
        self
    }

    /// Add one dimension to every datapoint.
    pub fn default_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_dimensions.insert(key, value);
        self
    }

    /// Add several dimensions to every datapoint.
    pub fn default_dimensions<K, V>(mut self, dimensions: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.default_dimensions.extend(dimensions);
        self
    }

    /// Set the source reported with every datapoint.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Choose the aggregations that are reported.
    pub fn detail_set(mut self, detail_set: DetailSet) -> Self {
        self.detail_set = detail_set;
        self
    }

    /// Change the publishing interval.
    ///
    /// This value defaults to 10 seconds and must be at least one second.
    pub fn publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// Change the per-request HTTP timeout. Defaults to 30 seconds.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Change how request bodies are encoded. Defaults to [`WireFormat::Protobuf`].
    pub fn wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = wire_format;
        self
    }

    /// Checks every setting and returns either the configuration or all of its problems.
    pub fn build(self) -> Result<ReportingConfig, ConfigError> {
        let mut errors = ConfigError::builder();

        let api_token = self.api_token.unwrap_or_default();
        errors.ensure_mut(!api_token.trim().is_empty(), || {
            "for `api_token`: must not be empty".to_owned()
        });

        let source = self.source.unwrap_or_default();
        errors.ensure_mut(!source.trim().is_empty(), || {
            "for `source`: must not be empty".to_owned()
        });

        let base_uri = self.base_uri.trim_end_matches('/').to_owned();
        errors.ensure_mut(is_http_uri(&base_uri), || {
            format!("for `base_uri`: `{base_uri}` is not an http(s) URI with a host")
        });

        errors.ensure_mut(
            (1..=MAX_DATAPOINTS_PER_MESSAGE).contains(&self.max_datapoints_per_message),
            || {
                format!(
                    "for `max_datapoints_per_message`: {} is not in 1..={MAX_DATAPOINTS_PER_MESSAGE}",
                    self.max_datapoints_per_message
                )
            },
        );

        errors.ensure_mut(self.publish_interval >= MIN_PUBLISH_INTERVAL, || {
            format!(
                "for `publish_interval`: {:?} is shorter than one second",
                self.publish_interval
            )
        });

        errors.ensure_mut(!self.http_timeout.is_zero(), || {
            "for `http_timeout`: must not be zero".to_owned()
        });

        for (key, value) in self.default_dimensions.iter() {
            errors.ensure_mut(!key.is_empty(), || {
                format!("for `default_dimensions`: the value `{value}` has an empty key")
            });
            errors.ensure_mut(!value.is_empty(), || {
                format!("for `default_dimensions`: `{key}` has an empty value")
            });
        }

        errors.build()?;
        Ok(ReportingConfig {
            api_token,
            base_uri,
            max_datapoints_per_message: self.max_datapoints_per_message,
            default_dimensions: self.default_dimensions,
            source,
            detail_set: self.detail_set,
            publish_interval: self.publish_interval,
            http_timeout: self.http_timeout,
            wire_format: self.wire_format,
        })
    }
}

fn is_http_uri(uri: &str) -> bool {
    Url::parse(uri).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}
