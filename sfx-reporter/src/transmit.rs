// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Delivery of one batch to the ingestion endpoint.

use std::fmt;

use sfx_reporter_core::Batch;

use crate::ReportingConfig;
use crate::transport::{Transport, TransportError};
use crate::wire::WireFormat;

const USER_AGENT: &str = concat!("sfx-reporter/", env!("CARGO_PKG_VERSION"));

/// Why a batch was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitError {
    /// The endpoint refused the batch. Sending it again would fail the same way.
    Rejected {
        /// The 4xx status, or `None` when the batch could not be encoded at all.
        status: Option<u16>,
        /// The response body, or the encoding error.
        body: String,
    },
    /// The endpoint could not take the batch right now: a 5xx status, a connection failure
    /// or a timeout.
    Unavailable(String),
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected {
                status: Some(status),
                body,
            } => write!(f, "batch rejected with status {status}: {body}"),
            Self::Rejected { status: None, body } => write!(f, "batch could not be encoded: {body}"),
            Self::Unavailable(reason) => write!(f, "ingestion endpoint unavailable: {reason}"),
        }
    }
}

impl std::error::Error for TransmitError {}

impl From<TransportError> for TransmitError {
    fn from(error: TransportError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Posts batches to `{base_uri}/v2/datapoint`, authenticated with the API token.
///
/// One attempt is made per batch. Whether to try again is left to the next cycle.
#[derive(Debug, Clone)]
pub struct Transmitter<T> {
    transport: T,
    url: String,
    headers: Vec<(&'static str, String)>,
    wire_format: WireFormat,
}

impl<T: Transport> Transmitter<T> {
    /// Creates a transmitter for the endpoint and token of `config`.
    pub fn new(config: &ReportingConfig, transport: T) -> Self {
        Self {
            transport,
            url: config.datapoint_url(),
            headers: vec![
                ("X-SF-TOKEN", config.api_token().to_owned()),
                ("Content-Type", config.wire_format().content_type().to_owned()),
                ("User-Agent", USER_AGENT.to_owned()),
            ],
            wire_format: config.wire_format(),
        }
    }

    /// Sends one batch and returns how many datapoints were accepted.
    pub async fn send(&self, batch: &Batch) -> Result<usize, TransmitError> {
        let body = self.wire_format.encode(batch).map_err(|e| TransmitError::Rejected {
            status: None,
            body: e.to_string(),
        })?;
        let response = self.transport.post(&self.url, &self.headers, body).await?;
        match response.status {
            200..=299 => Ok(batch.len()),
            status @ 400..=499 => Err(TransmitError::Rejected {
                status: Some(status),
                body: response.body,
            }),
            status => Err(TransmitError::Unavailable(format!(
                "status {status}: {}",
                response.body
            ))),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
