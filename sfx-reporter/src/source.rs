// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Resolving the `source` dimension from the host's names.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use sfx_reporter_core::ConfigError;

const NETBIOS_MAX_LEN: usize = 15;

/// How the `source` dimension is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// The short, upper-cased machine name (`COMPUTERNAME` when set).
    #[default]
    Netbios,
    /// The host name as reported by the operating system.
    Dns,
    /// The fully qualified host name, falling back to the netbios name when the host name
    /// is not dot-qualified.
    Fqdn,
    /// A configured value.
    Custom,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Netbios => "netbios",
            Self::Dns => "dns",
            Self::Fqdn => "fqdn",
            Self::Custom => "custom",
        })
    }
}

impl FromStr for SourceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "netbios" => Ok(Self::Netbios),
            "dns" => Ok(Self::Dns),
            "fqdn" => Ok(Self::Fqdn),
            "custom" => Ok(Self::Custom),
            _ => Err(ConfigError::invalid(format!(
                "unknown source type `{s}`, expected one of netbios, dns, fqdn, custom"
            ))
            .for_field("source_type")),
        }
    }
}

/// Where host names come from. Swapped out in tests.
pub trait HostNames {
    /// The operating system's host name.
    fn hostname(&self) -> Option<String>;
    /// The `COMPUTERNAME` environment variable, when set.
    fn computer_name(&self) -> Option<String>;
}

/// Reads host names from the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostNames;

impl HostNames for SystemHostNames {
    fn hostname(&self) -> Option<String> {
        hostname::get().ok().and_then(|s| s.into_string().ok())
    }

    fn computer_name(&self) -> Option<String> {
        std::env::var("COMPUTERNAME").ok()
    }
}

/// Resolves the source for `source_type`.
///
/// `custom` is only used with [`SourceType::Custom`].
pub fn resolve_source(
    source_type: SourceType,
    custom: Option<&str>,
    hosts: &impl HostNames,
) -> Result<String, ConfigError> {
    let resolved = match source_type {
        SourceType::Netbios => netbios_name(hosts),
        SourceType::Dns => non_empty(hosts.hostname()),
        SourceType::Fqdn => non_empty(hosts.hostname())
            .filter(|name| name.contains('.'))
            .or_else(|| netbios_name(hosts)),
        SourceType::Custom => non_empty(custom.map(str::to_owned)),
    };
    resolved.ok_or_else(|| {
        let reason = match source_type {
            SourceType::Custom => "a non-empty `source` is required with source type custom"
                .to_owned(),
            other => format!("cannot determine a {other} name for this host"),
        };
        ConfigError::invalid(reason).for_field("source")
    })
}

fn netbios_name(hosts: &impl HostNames) -> Option<String> {
    if let Some(name) = non_empty(hosts.computer_name()) {
        return Some(name);
    }
    let hostname = non_empty(hosts.hostname())?;
    let short = hostname.split('.').next().unwrap_or_default();
    non_empty(Some(
        short
            .chars()
            .take(NETBIOS_MAX_LEN)
            .collect::<String>()
            .to_uppercase(),
    ))
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
}
