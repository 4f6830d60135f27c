// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Label sets and the rules for merging them.
//!
//! A datapoint's labels come from three places, in increasing precedence:
//!
//! 1. the configured default dimensions
//! 2. the resolved source, always under [`SOURCE_KEY`]
//! 3. the item labels of the sub-series being reported, each a `key=value` string
//!
//! Item labels that don't have that shape are free-form tags, not dimensions, and are skipped.

use std::collections::BTreeMap;
use std::collections::btree_map;

/// The reserved label key under which the reporting source is stored.
pub const SOURCE_KEY: &str = "source";

/// A set of label key/value pairs, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Creates an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a label, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether the set has a label named `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Returns a copy of this set with `item_labels` layered on top.
    pub fn with_item_labels<S: AsRef<str>>(&self, item_labels: &[S]) -> Self {
        let mut merged = self.clone();
        merged.extend_item_labels(item_labels);
        merged
    }

    fn extend_item_labels<S: AsRef<str>>(&mut self, item_labels: &[S]) {
        for label in item_labels {
            if let Some((key, value)) = parse_item_label(label.as_ref()) {
                self.insert(key, value);
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for LabelSet {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for LabelSet {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Splits an item label of the form `key=value` at its first `=`.
///
/// Returns `None` for labels without a `=`, with an empty key, or with an empty value (the
/// ingestion API rejects empty dimension values).
pub fn parse_item_label(label: &str) -> Option<(&str, &str)> {
    let (key, value) = label.split_once('=')?;
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Merges the default dimensions, the source and a metric's item labels into one label set.
///
/// `source` must be non-empty; that is checked once when the reporter is configured.
pub fn merge<S: AsRef<str>>(defaults: &LabelSet, source: &str, item_labels: &[S]) -> LabelSet {
    debug_assert!(!source.is_empty(), "source is validated at setup");
    let mut merged = defaults.clone();
    merged.insert(SOURCE_KEY, source);
    merged.extend_item_labels(item_labels);
    merged
}
