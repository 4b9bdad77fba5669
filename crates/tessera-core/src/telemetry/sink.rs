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

//! Sinks: consumers that periodically report the aggregated registry.

use crate::telemetry::metrics::MetricValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// An ordered, consistent view of every metric in the central registry.
///
/// A snapshot is taken under a single read of the registry, so a source is
/// either fully present in it or absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegistrySnapshot {
    entries: BTreeMap<String, MetricValue>,
}

impl RegistrySnapshot {
    /// Wraps already-collected values.
    pub fn new(entries: BTreeMap<String, MetricValue>) -> Self {
        Self { entries }
    }

    /// The value recorded for a fully-qualified name.
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries.get(name)
    }

    /// Iterates over `(name, value)` pairs in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of metrics in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, MetricValue)> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An error raised by a sink while starting, reporting or stopping.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The snapshot could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The destination is not reachable or not ready.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// A consumer of registry snapshots.
///
/// The metrics system owns the periodic trigger: it calls [`Sink::report`]
/// from a dedicated thread per sink, so an implementation only has to deal
/// with its own destination. `start` and `stop` bracket the reporting
/// lifetime and default to no-ops.
pub trait Sink: Send + Sync + Debug {
    /// A short name used in logs and introspection.
    fn name(&self) -> &str;

    /// Acquires resources before the first report.
    fn start(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Delivers one snapshot.
    fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), SinkError>;

    /// Flushes and releases resources after the last report.
    fn stop(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_ordering_and_lookup() {
        let snapshot: RegistrySnapshot = vec![
            ("b.m".to_string(), MetricValue::Gauge(1.5)),
            ("a.m".to_string(), MetricValue::Counter(2)),
        ]
        .into_iter()
        .collect();

        let names: Vec<_> = snapshot.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a.m", "b.m"]);
        assert_eq!(snapshot.get("a.m"), Some(&MetricValue::Counter(2)));
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_serializes_as_map() {
        let snapshot: RegistrySnapshot =
            std::iter::once(("app.m".to_string(), MetricValue::Gauge(2.0))).collect();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"app.m":{"gauge":2.0}}"#);
    }

    #[test]
    fn test_sink_error_display() {
        let err = SinkError::Unavailable("endpoint down".to_string());
        assert_eq!(err.to_string(), "Sink unavailable: endpoint down");
    }
}
