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

//! Periodic report cycles, one background thread per sink.

use crate::metrics::registry::LiveRegistry;
use crate::utils::timer::ScopedMetricTimer;
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_core::telemetry::{Counter, Histogram, MetricSet, MetricsResult, Sink};

/// Counters shared by every report cycle of one metrics system.
#[derive(Debug)]
pub struct ReportStats {
    /// Successful reports.
    pub delivered: Arc<Counter>,
    /// Reports that returned an error.
    pub failed: Arc<Counter>,
    /// Wall-clock duration of each report, snapshot included.
    pub duration_ms: Arc<Histogram>,
}

impl ReportStats {
    /// Bucket bounds of the duration histogram, in milliseconds.
    pub const DURATION_BUCKETS_MS: [f64; 7] = [1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1_000.0];

    /// Creates the statistics as metrics of `set`.
    pub fn register(set: &MetricSet) -> MetricsResult<Self> {
        Ok(Self {
            delivered: set.counter("reports.delivered")?,
            failed: set.counter("reports.failed")?,
            duration_ms: set.histogram("reports.duration_ms", Self::DURATION_BUCKETS_MS.to_vec())?,
        })
    }
}

impl Default for ReportStats {
    /// Statistics that are not exposed through any source.
    fn default() -> Self {
        Self {
            delivered: Arc::new(Counter::new()),
            failed: Arc::new(Counter::new()),
            duration_ms: Arc::new(Histogram::new(Self::DURATION_BUCKETS_MS.to_vec())),
        }
    }
}

/// Takes one snapshot of `registry` and hands it to `sink`.
///
/// Failures are logged and counted, never propagated: one failing report
/// must not stop the cycle.
pub fn deliver(sink: &dyn Sink, registry: &LiveRegistry, stats: &ReportStats) -> bool {
    let _timer = ScopedMetricTimer::new(&stats.duration_ms);
    let snapshot = registry.snapshot();
    match sink.report(&snapshot) {
        Ok(()) => {
            log::trace!("Sink {} reported {} metrics", sink.name(), snapshot.len());
            stats.delivered.inc();
            true
        }
        Err(e) => {
            log::error!("Sink {} failed to report: {}", sink.name(), e);
            stats.failed.inc();
            false
        }
    }
}

/// A background thread calling [`deliver`] once per period.
///
/// Dropping the shutdown sender wakes the thread immediately; [`stop`]
/// then joins it, so no report is in flight once it returns.
///
/// [`stop`]: ReportCycle::stop
#[derive(Debug)]
pub struct ReportCycle {
    sink_name: String,
    shutdown: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReportCycle {
    /// Starts reporting `sink` every `period`.
    pub fn spawn(
        sink: Arc<dyn Sink>,
        period: Duration,
        registry: Arc<LiveRegistry>,
        stats: Arc<ReportStats>,
    ) -> std::io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let sink_name = sink.name().to_string();

        let handle = thread::Builder::new()
            .name(format!("metrics-sink-{sink_name}"))
            .spawn(move || {
                log::debug!("Report cycle of sink {} started ({:?})", sink.name(), period);
                let mut next_tick = Instant::now() + period;

                loop {
                    let wait = next_tick.saturating_duration_since(Instant::now());
                    match shutdown_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            deliver(sink.as_ref(), &registry, &stats);

                            // Skip missed ticks instead of bursting after a slow report
                            next_tick += period;
                            let now = Instant::now();
                            if next_tick <= now {
                                next_tick = now + period;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("Report cycle of sink {} stopped", sink.name());
            })?;

        Ok(Self {
            sink_name,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Name of the sink driven by this cycle.
    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Returns `true` while the thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the timer and waits for an in-flight report to finish.
    pub fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Report cycle of sink {} panicked", self.sink_name);
            }
        }
    }
}

impl Drop for ReportCycle {
    fn drop(&mut self) {
        self.stop();
    }
}
