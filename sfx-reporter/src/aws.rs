// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! EC2 instance metadata, used to tag datapoints with the `InstanceId` dimension.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use sfx_reporter_core::ConfigError;

/// The dimension the instance id is reported under.
pub const INSTANCE_ID_DIMENSION: &str = "InstanceId";
/// Where the instance identity document is served on EC2.
pub const DEFAULT_IDENTITY_DOCUMENT_URL: &str =
    "http://169.254.169.254/latest/dynamic/instance-identity/document";
const METADATA_TIMEOUT: Duration = Duration::from_secs(1);

/// Source of the current instance's metadata.
pub trait AwsMetadata {
    /// Fetches the EC2 instance id.
    fn instance_id(&self) -> impl Future<Output = Result<String, ConfigError>> + Send;
}

/// Response of the identity document endpoint.
///
/// Only the field the reporter uses is read, e.g.:
///
/// ```json
/// {
///     "instanceId": "i-1234567890abcdef0",
///     "region": "us-east-1",
///     "availabilityZone": "us-east-1a"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    instance_id: String,
}

/// Reads the identity document over HTTP with a one second timeout.
#[derive(Debug, Clone)]
pub struct AwsMetadataClient {
    client: reqwest::Client,
    url: String,
}

impl AwsMetadataClient {
    /// Creates a client for the standard EC2 metadata endpoint.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_url(DEFAULT_IDENTITY_DOCUMENT_URL)
    }

    /// Creates a client for an identity document served at `url`.
    pub fn with_url(url: impl Into<String>) -> Result<Self, ConfigError> {
        // the metadata endpoint is link-local and must never be proxied
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|e| {
                ConfigError::invalid(format!("cannot build metadata client: {e}"))
                    .for_field("aws_integration")
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        let document: IdentityDocument = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(document.instance_id)
    }
}

impl AwsMetadata for AwsMetadataClient {
    fn instance_id(&self) -> impl Future<Output = Result<String, ConfigError>> + Send {
        async move {
            let error = match self.fetch().await {
                Ok(id) if !id.is_empty() => return Ok(id),
                Ok(_) => ConfigError::invalid("the instance identity document has an empty instanceId"),
                Err(e) => ConfigError::invalid(format!(
                    "cannot read the instance identity document from {}: {e}",
                    self.url
                )),
            };
            Err(error.for_field("aws_integration"))
        }
    }
}
