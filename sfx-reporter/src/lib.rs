// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod aws;
pub mod config;
pub mod cycle;
mod reporter;
pub mod settings;
pub mod source;
pub mod transmit;
pub mod transport;
pub mod wire;

pub use aws::{AwsMetadata, AwsMetadataClient};
pub use config::{ReportingConfig, ReportingConfigBuilder};
pub use cycle::{BatchOutcome, CycleReport, ReportCycle};
pub use reporter::{Reporter, ReporterBuilder, YouMustConfigureARegistry};
pub use settings::{ReporterSettings, SettingsError};
pub use source::{HostNames, SourceType, SystemHostNames};
pub use transmit::{TransmitError, Transmitter};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
pub use wire::WireFormat;

pub use sfx_reporter_core::{ConfigError, MetricRegistry, TimeSource};
