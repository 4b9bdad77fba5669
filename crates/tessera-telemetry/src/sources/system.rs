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

//! Metrics describing the metrics system itself.

use crate::sinks::schedule::ReportStats;
use std::sync::Arc;
use tessera_core::telemetry::{Gauge, MetricSet, MetricsResult, Source};

/// Static source registered by every metrics system at construction.
#[derive(Debug)]
pub struct SystemSource {
    metrics: MetricSet,
    registered_sources: Arc<Gauge>,
    active_sinks: Arc<Gauge>,
    report_stats: Arc<ReportStats>,
}

impl SystemSource {
    /// Name under which the source is registered.
    pub const NAME: &'static str = "metrics-system";

    /// Creates the source and its metrics.
    pub fn new() -> MetricsResult<Self> {
        let metrics = MetricSet::new();
        let registered_sources = metrics.gauge("sources.registered")?;
        let active_sinks = metrics.gauge("sinks.active")?;
        let report_stats = Arc::new(ReportStats::register(&metrics)?);
        Ok(Self {
            metrics,
            registered_sources,
            active_sinks,
            report_stats,
        })
    }

    /// Records the current number of registered sources.
    pub fn set_registered_sources(&self, count: usize) {
        self.registered_sources.set(count as f64);
    }

    /// Records the current number of sinks with a running report cycle.
    pub fn set_active_sinks(&self, count: usize) {
        self.active_sinks.set(count as f64);
    }

    /// Statistics updated by the report cycles.
    pub fn report_stats(&self) -> Arc<ReportStats> {
        Arc::clone(&self.report_stats)
    }
}

impl Source for SystemSource {
    fn source_name(&self) -> &str {
        Self::NAME
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::telemetry::{Metric, MetricValue};

    #[test]
    fn test_exposes_lifecycle_metrics() {
        let source = SystemSource::new().unwrap();
        source.set_registered_sources(3);
        source.report_stats().delivered.inc();

        assert_eq!(source.source_name(), "metrics-system");
        assert_eq!(
            source.metrics().names(),
            vec![
                "reports.delivered",
                "reports.duration_ms",
                "reports.failed",
                "sinks.active",
                "sources.registered",
            ]
        );
        assert_eq!(
            source.metrics().get("sources.registered").unwrap().value(),
            MetricValue::Gauge(3.0)
        );
        assert_eq!(
            source.metrics().get("reports.delivered").unwrap().value(),
            MetricValue::Counter(1)
        );
    }
}
