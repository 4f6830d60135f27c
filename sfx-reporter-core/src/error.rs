// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// An error that describes why a reporter can't be set up: a missing API token, a source type
/// without a usable source, an interval or batch size out of range, a failed AWS metadata fetch.
///
/// Configuration problems are only ever detected once, before the first reporting cycle, so
/// this type collects every failure it can find rather than stopping at the first one.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigError(Vec<String>);

impl ConfigError {
    /// Create a builder that can be used to compose multiple configuration failures into a single
    /// [`ConfigError`]. If no failures are added, [`ConfigErrorBuilder::build()`] returns [`Ok`].
    pub fn builder() -> ConfigErrorBuilder {
        ConfigErrorBuilder::default()
    }

    /// Record a single configuration failure.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self(vec![reason.into()])
    }

    /// Extend this error with all of the failures recorded in `other`.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Add the setting `name` as context for all of the failures reported in `self`.
    pub fn for_field(mut self, name: &str) -> Self {
        for err in self.0.iter_mut() {
            *err = format!("for `{name}`: {err}");
        }
        self
    }

    /// The individual failure messages, in the order they were recorded.
    pub fn reasons(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Debug for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid reporter configuration: {}", self.0.join(", "))
    }
}

impl std::error::Error for ConfigError {}

/// Builder to record configuration failures over time and bundle them into a single
/// [`ConfigError`].
#[derive(Debug, Clone, Default)]
pub struct ConfigErrorBuilder(Vec<String>);

impl ConfigErrorBuilder {
    /// Returns [`Ok`] if no failures were recorded, otherwise [`Err`] with all of them.
    pub fn build(self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ConfigError(self.0))
        }
    }

    // Same $method(), $method_mut() split as the rest of the crate so the builder works both
    // chained and as a local accumulator.

    /// Record a configuration failure.
    pub fn invalid(mut self, reason: impl Into<String>) -> Self {
        self.invalid_mut(reason);
        self
    }

    /// Record a configuration failure, but only require `&mut Self`.
    pub fn invalid_mut(&mut self, reason: impl Into<String>) -> &mut Self {
        self.0.push(reason.into());
        self
    }

    /// Record `reason` unless `condition` holds.
    pub fn ensure_mut(&mut self, condition: bool, reason: impl FnOnce() -> String) -> &mut Self {
        if !condition {
            self.0.push(reason());
        }
        self
    }

    /// Extend this builder with all of the failures recorded in `error`.
    pub fn extend_mut(&mut self, error: ConfigError) -> &mut Self {
        self.0.extend(error.0);
        self
    }

    /// Record the error of `result`, if any, and hand back the success value.
    pub fn record<T>(&mut self, result: Result<T, ConfigError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.extend_mut(err);
                None
            }
        }
    }
}
