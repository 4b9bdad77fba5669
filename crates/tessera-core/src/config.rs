// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Read-only configuration consumed by the metrics system.
//!
//! The metrics system never parses configuration files itself. An external
//! loader produces a flat string-to-string map, and the system only needs
//! lookup and enumeration over it, expressed by [`ConfigView`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Well-known configuration keys read by the metrics system.
pub mod keys {
    /// Identifier of the running application.
    pub const APPLICATION_ID: &str = "application.id";
    /// Human-readable application name, commonly referenced from a namespace template.
    pub const APPLICATION_NAME: &str = "application.name";
    /// Identifier of the executor hosting this process.
    pub const EXECUTOR_ID: &str = "executor.id";
    /// Naming root template overriding the application identifier.
    pub const METRICS_NAMESPACE: &str = "metrics.namespace";
}

/// A read-only view over string configuration entries.
///
/// Implementations must return a stable answer for the lifetime of the
/// metrics system they are handed to.
pub trait ConfigView: Send + Sync + Debug {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<&str>;

    /// Returns `true` if `key` is present, even when its value is empty.
    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over every `(key, value)` pair.
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_>;
}

/// An in-memory, ordered configuration map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsConfig {
    entries: BTreeMap<String, String>,
}

impl MetricsConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, convenient for assembling a configuration inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the configuration holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigView for MetricsConfig {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        Box::new(
            self.entries
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetricsConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for MetricsConfig {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}
