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

//! Process-level metrics read through `sysinfo`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};
use tessera_core::telemetry::{MetricSet, MetricsResult, Source};

/// Minimum delay between two refreshes of the process table.
const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct SamplerState {
    system: System,
    last_refresh: Option<Instant>,
}

/// Shared, rate-limited access to this process' `sysinfo` entry.
#[derive(Debug)]
struct ProcessSampler {
    pid: Pid,
    state: Mutex<SamplerState>,
}

impl ProcessSampler {
    fn new(pid: Pid) -> Self {
        Self {
            pid,
            state: Mutex::new(SamplerState {
                system: System::new(),
                last_refresh: None,
            }),
        }
    }

    fn read(&self, read: impl FnOnce(&Process) -> f64) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = state
            .last_refresh
            .map_or(true, |at| at.elapsed() >= REFRESH_INTERVAL);
        if stale {
            state.system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[self.pid]),
                true,
                ProcessRefreshKind::nothing().with_memory().with_cpu(),
            );
            state.last_refresh = Some(Instant::now());
        }
        state.system.process(self.pid).map(read).unwrap_or(0.0)
    }
}

/// Resident memory, virtual memory, CPU usage and uptime of the current process.
///
/// All metrics are callback gauges: values are read when a snapshot is taken.
#[derive(Debug)]
pub struct ProcessSource {
    name: String,
    metrics: MetricSet,
}

impl ProcessSource {
    /// Creates the source under `name`.
    ///
    /// When the current process cannot be identified only the uptime gauge is exposed.
    pub fn new(name: impl Into<String>) -> MetricsResult<Self> {
        let metrics = MetricSet::new();

        let started = Instant::now();
        metrics.callback_gauge("uptime_seconds", move || started.elapsed().as_secs_f64())?;

        match sysinfo::get_current_pid() {
            Ok(pid) => {
                let sampler = Arc::new(ProcessSampler::new(pid));

                let p = Arc::clone(&sampler);
                metrics.callback_gauge("memory.resident_bytes", move || {
                    p.read(|process| process.memory() as f64)
                })?;
                let p = Arc::clone(&sampler);
                metrics.callback_gauge("memory.virtual_bytes", move || {
                    p.read(|process| process.virtual_memory() as f64)
                })?;
                let p = sampler;
                metrics.callback_gauge("cpu.usage_percent", move || {
                    p.read(|process| f64::from(process.cpu_usage()))
                })?;
            }
            Err(e) => log::warn!("Process metrics unavailable: {e}"),
        }

        Ok(Self {
            name: name.into(),
            metrics,
        })
    }
}

impl Source for ProcessSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::telemetry::Metric;

    #[test]
    fn test_process_metrics() {
        let source = ProcessSource::new("process").unwrap();
        assert_eq!(source.source_name(), "process");

        let uptime = source.metrics().get("uptime_seconds").unwrap();
        assert!(uptime.value().as_gauge().unwrap() >= 0.0);

        // Resident memory of a running test binary is never zero on supported platforms
        if let Some(resident) = source.metrics().get("memory.resident_bytes") {
            assert!(resident.value().as_gauge().unwrap() > 0.0);
            assert_eq!(source.metrics().len(), 4);
        }
    }
}
