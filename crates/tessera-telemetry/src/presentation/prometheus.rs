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

//! Prometheus text exposition format (version 0.0.4).

use super::{PresentationError, PresentationHandler};
use crate::metrics::registry::LiveRegistry;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;
use tessera_core::telemetry::{MetricValue, RegistrySnapshot};
use tessera_core::SecurityContext;

/// Serves the registry in the Prometheus text format.
#[derive(Debug)]
pub struct PrometheusHandler {
    path: String,
    registry: Arc<LiveRegistry>,
    security: Arc<dyn SecurityContext>,
}

impl PrometheusHandler {
    /// Mount point used when `path` is not configured.
    pub const DEFAULT_PATH: &'static str = "/metrics/prometheus";

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

impl PresentationHandler for PrometheusHandler {
    fn path(&self) -> &str {
        &self.path
    }

    fn content_type(&self) -> &str {
        "text/plain; version=0.0.4"
    }

    fn render(&self, user: Option<&str>) -> Result<String, PresentationError> {
        if !self.security.can_view(user) {
            return Err(PresentationError::Forbidden(user.map(str::to_string)));
        }
        encode(&self.registry.snapshot())
            .map_err(|e| PresentationError::Serialization(e.to_string()))
    }
}

/// Encodes a snapshot in the text exposition format.
///
/// Names that sanitize to the same family are emitted once, for the first
/// of them in name order; the others are logged and dropped.
pub fn encode(snapshot: &RegistrySnapshot) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let mut families = BTreeSet::new();
    for (original, value) in snapshot.iter() {
        let name = sanitize(original);
        if !families.insert(name.clone()) {
            log::warn!(
                "Metric {} is exported as {}, which is already taken; skipping it",
                original,
                name
            );
            continue;
        }
        match value {
            MetricValue::Counter(v) => {
                writeln!(out, "# TYPE {name} counter")?;
                writeln!(out, "{name} {v}")?;
            }
            MetricValue::Gauge(v) => {
                writeln!(out, "# TYPE {name} gauge")?;
                writeln!(out, "{name} {}", number(*v))?;
            }
            MetricValue::Histogram {
                count,
                sum,
                bucket_bounds,
                bucket_counts,
                ..
            } => {
                writeln!(out, "# TYPE {name} histogram")?;
                for (bound, cumulative) in bucket_bounds.iter().zip(bucket_counts) {
                    writeln!(out, "{name}_bucket{{le=\"{}\"}} {cumulative}", number(*bound))?;
                }
                writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {count}")?;
                writeln!(out, "{name}_sum {}", number(*sum))?;
                writeln!(out, "{name}_count {count}")?;
            }
        }
    }
    Ok(out)
}

/// Restricts a name to `[a-zA-Z0-9_:]`, never starting with a digit.
pub fn sanitize(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ':' { c } else { '_' })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

fn number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}
