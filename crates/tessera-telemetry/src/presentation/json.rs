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

//! JSON rendering grouped by metric type.

use super::{PresentationError, PresentationHandler};
use crate::metrics::registry::LiveRegistry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::telemetry::{MetricValue, RegistrySnapshot};
use tessera_core::SecurityContext;

#[derive(Debug, Default, Serialize)]
struct HistogramView {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    mean: f64,
    buckets: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Serialize)]
struct Document {
    gauges: BTreeMap<String, f64>,
    counters: BTreeMap<String, u64>,
    histograms: BTreeMap<String, HistogramView>,
}

impl From<&RegistrySnapshot> for Document {
    fn from(snapshot: &RegistrySnapshot) -> Self {
        let mut document = Document::default();
        for (name, value) in snapshot.iter() {
            match value {
                MetricValue::Counter(v) => {
                    document.counters.insert(name.to_string(), *v);
                }
                MetricValue::Gauge(v) => {
                    document.gauges.insert(name.to_string(), *v);
                }
                MetricValue::Histogram {
                    count,
                    sum,
                    min,
                    max,
                    bucket_bounds,
                    bucket_counts,
                } => {
                    let buckets = bucket_bounds
                        .iter()
                        .zip(bucket_counts)
                        .map(|(bound, count)| (bound.to_string(), *count))
                        .collect();
                    document.histograms.insert(
                        name.to_string(),
                        HistogramView {
                            count: *count,
                            sum: *sum,
                            min: *min,
                            max: *max,
                            mean: if *count == 0 { 0.0 } else { sum / *count as f64 },
                            buckets,
                        },
                    );
                }
            }
        }
        document
    }
}

/// Serves the registry as a JSON document.
#[derive(Debug)]
pub struct JsonHandler {
    path: String,
    registry: Arc<LiveRegistry>,
    security: Arc<dyn SecurityContext>,
}

impl JsonHandler {
    /// Mount point used when `path` is not configured.
    pub const DEFAULT_PATH: &'static str = "/metrics/json";

    /// Creates a handler over `registry`.
    pub fn new(
        path: impl Into<String>,
        registry: Arc<LiveRegistry>,
        security: Arc<dyn SecurityContext>,
    ) -> Self {
        Self {
            path: path.into(),
            registry,
            security,
        }
    }
}

impl PresentationHandler for JsonHandler {
    fn path(&self) -> &str {
        &self.path
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, user: Option<&str>) -> Result<String, PresentationError> {
        if !self.security.can_view(user) {
            return Err(PresentationError::Forbidden(user.map(str::to_string)));
        }
        let document = Document::from(&self.registry.snapshot());
        serde_json::to_string_pretty(&document)
            .map_err(|e| PresentationError::Serialization(e.to_string()))
    }
}
