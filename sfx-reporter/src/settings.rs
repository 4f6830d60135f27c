// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! File-based reporter settings.
//!
//! ```toml
//! api_token = "abc123"
//! interval = 30
//! source_type = "custom"
//! source = "checkout-service"
//! detail_set = ["count", "mean", "p99"]
//! wire_format = "json"
//!
//! [default_dimensions]
//! environment = "prod"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use sfx_reporter_core::{AggregationKey, ConfigError, DetailSet, MAX_DATAPOINTS_PER_MESSAGE};

use crate::aws::{AwsMetadata, INSTANCE_ID_DIMENSION};
use crate::config::{DEFAULT_BASE_URI, DEFAULT_HTTP_TIMEOUT, DEFAULT_PUBLISH_INTERVAL};
use crate::source::{HostNames, SourceType, resolve_source};
use crate::wire::WireFormat;
use crate::ReportingConfig;

/// Unresolved reporter settings, as written in a settings file.
///
/// Every field but `api_token` has a default. Call [`resolve`](Self::resolve) to turn the
/// settings into a [`ReportingConfig`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReporterSettings {
    /// The ingest API token.
    pub api_token: String,
    /// Seconds between reporting cycles.
    pub interval: u64,
    /// The ingestion base URI.
    pub base_uri: String,
    /// Largest number of datapoints per request.
    pub max_datapoints_per_message: usize,
    /// Dimensions added to every datapoint.
    pub default_dimensions: BTreeMap<String, String>,
    /// How the `source` dimension is derived.
    pub source_type: SourceType,
    /// The source, for [`SourceType::Custom`].
    pub source: Option<String>,
    /// Whether to add the EC2 `InstanceId` dimension.
    pub aws_integration: bool,
    /// Aggregations to report, e.g. `["count", "p99", "rate_1m"]`. Empty means the defaults.
    pub detail_set: Vec<String>,
    /// Seconds an HTTP request may take.
    pub http_timeout_secs: u64,
    /// How request bodies are encoded, `protobuf` or `json`.
    pub wire_format: WireFormat,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            interval: DEFAULT_PUBLISH_INTERVAL.as_secs(),
            base_uri: DEFAULT_BASE_URI.to_owned(),
            max_datapoints_per_message: MAX_DATAPOINTS_PER_MESSAGE,
            default_dimensions: BTreeMap::new(),
            source_type: SourceType::default(),
            source: None,
            aws_integration: false,
            detail_set: Vec::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            wire_format: WireFormat::default(),
        }
    }
}

/// A settings file that could not be read or parsed.
#[derive(Debug)]
pub enum SettingsError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The contents are not valid settings.
    Parse(toml::de::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read reporter settings: {e}"),
            Self::Parse(e) => write!(f, "cannot parse reporter settings: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<SettingsError> for ConfigError {
    fn from(error: SettingsError) -> Self {
        ConfigError::invalid(error.to_string())
    }
}

impl ReporterSettings {
    /// Parses settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        toml::from_str(text).map_err(SettingsError::Parse)
    }

    /// Reads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(SettingsError::Io)?;
        Self::from_toml_str(&text)
    }

    /// Resolves the source and AWS dimension and validates everything.
    ///
    /// The returned error lists every problem that was found. AWS metadata is only fetched
    /// when `aws_integration` is set.
    pub async fn resolve(
        &self,
        hosts: &impl HostNames,
        aws: &impl AwsMetadata,
    ) -> Result<ReportingConfig, ConfigError> {
        let mut errors = ConfigError::builder();

        let detail_set = self.detail_set().map_err(|e| e.for_field("detail_set"));
        let detail_set = errors.record(detail_set);
        let source = errors.record(resolve_source(
            self.source_type,
            self.source.as_deref(),
            hosts,
        ));
        let instance_id = if self.aws_integration {
            errors.record(aws.instance_id().await)
        } else {
            None
        };

        let mut builder = ReportingConfig::builder()
            .api_token(&self.api_token)
            .base_uri(&self.base_uri)
            .max_datapoints_per_message(self.max_datapoints_per_message)
            .default_dimensions(&self.default_dimensions)
            .publish_interval(Duration::from_secs(self.interval))
            .http_timeout(Duration::from_secs(self.http_timeout_secs))
            .wire_format(self.wire_format)
            .detail_set(detail_set.unwrap_or_default());
        if let Some(instance_id) = instance_id {
            builder = builder.default_dimension(INSTANCE_ID_DIMENSION, instance_id);
        }
        // an unresolved source is already recorded above
        builder = builder.source(source.unwrap_or_else(|| "unresolved".to_owned()));

        let config = builder.build();
        if let Err(error) = &config {
            errors.extend_mut(error.clone());
        }
        errors.build()?;
        config
    }

    fn detail_set(&self) -> Result<DetailSet, ConfigError> {
        let mut errors = ConfigError::builder();
        let keys: Vec<AggregationKey> = self
            .detail_set
            .iter()
            .filter_map(|key| match key.parse::<AggregationKey>() {
                Ok(key) => Some(key),
                Err(e) => {
                    errors.invalid_mut(e.to_string());
                    None
                }
            })
            .collect();
        errors.build()?;
        if keys.is_empty() {
            Ok(DetailSet::default())
        } else {
            Ok(DetailSet::new(keys))
        }
    }
}
