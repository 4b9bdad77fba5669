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

//! Ownership and lifecycle of the configured sinks.

use crate::error::MetricsSystemError;
use crate::metrics::registry::LiveRegistry;
use crate::presentation::PresentationHandler;
use crate::properties::InstanceProperties;
use crate::sinks::factory::{SinkContext, SinkFactory, SinkInstance};
use crate::sinks::schedule::{deliver, ReportCycle, ReportStats};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tessera_core::telemetry::Sink;
use tessera_core::SecurityContext;

struct ManagedSink {
    sink: Arc<dyn Sink>,
    period: Duration,
    cycle: Option<ReportCycle>,
    /// A [`SinkManager::start`] call is launching this sink.
    starting: bool,
}

#[derive(Default)]
struct ManagerState {
    /// Append-only, so indices stay valid across unlocks.
    sinks: Vec<ManagedSink>,
    handlers: Vec<Arc<dyn PresentationHandler>>,
    running: bool,
    /// Bumped by every stop; launches begun before it are discarded.
    epoch: u64,
}

/// Instantiates sinks from configuration and drives their report cycles.
///
/// Each periodic sink gets its own [`ReportCycle`], so a slow sink never
/// delays another one. Presentation handlers have no cycle; they are only
/// collected for the hosting process to mount.
///
/// `Sink::start` runs without the state lock held, so a sink that is slow to
/// start never blocks registration or the self metrics.
pub struct SinkManager {
    registry: Arc<LiveRegistry>,
    security: Arc<dyn SecurityContext>,
    stats: Arc<ReportStats>,
    factory: SinkFactory,
    state: Mutex<ManagerState>,
    active: AtomicUsize,
}

impl SinkManager {
    /// Creates a manager reporting `registry`.
    pub fn new(
        registry: Arc<LiveRegistry>,
        security: Arc<dyn SecurityContext>,
        stats: Arc<ReportStats>,
        factory: SinkFactory,
    ) -> Self {
        Self {
            registry,
            security,
            stats,
            factory,
            state: Mutex::new(ManagerState::default()),
            active: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Instantiates every sink declared for the role.
    ///
    /// A sink that cannot be built is logged and skipped. Returns the number
    /// of sinks and handlers added.
    pub fn load_from_config(&self, properties: &InstanceProperties) -> usize {
        let mut loaded = 0;
        for (name, sink_properties) in properties.sub_properties("sink") {
            let ctx = SinkContext {
                name: &name,
                properties: &sink_properties,
                registry: &self.registry,
                security: &self.security,
            };
            match self.factory.build(&ctx) {
                Ok(SinkInstance::Periodic { sink, period }) => match self.add(sink, period) {
                    Ok(()) => loaded += 1,
                    Err(e) => log::warn!("Skipping sink {}: {}", name, e),
                },
                Ok(SinkInstance::Presentation(handler)) => {
                    log::info!("Presentation handler {} mounted at {}", name, handler.path());
                    self.add_handler(handler);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping sink {}: {}", name, e),
            }
        }
        loaded
    }

    /// Adds a periodic sink, starting its cycle if the manager is running.
    pub fn add(&self, sink: Arc<dyn Sink>, period: Duration) -> Result<(), MetricsSystemError> {
        let epoch = {
            let mut state = self.state();
            if !state.running {
                log::info!("Registered sink {} (period {:?})", sink.name(), period);
                state.sinks.push(ManagedSink {
                    sink,
                    period,
                    cycle: None,
                    starting: false,
                });
                return Ok(());
            }
            state.epoch
        };

        let cycle = self.launch(&sink, period)?;
        let mut state = self.state();
        log::info!("Registered sink {} (period {:?})", sink.name(), period);
        if state.running && state.epoch == epoch {
            self.active.fetch_add(1, Ordering::SeqCst);
            state.sinks.push(ManagedSink {
                sink,
                period,
                cycle: Some(cycle),
                starting: false,
            });
        } else {
            // Stopped while this sink was starting
            state.sinks.push(ManagedSink {
                sink: Arc::clone(&sink),
                period,
                cycle: None,
                starting: false,
            });
            drop(state);
            halt(&sink, cycle);
        }
        Ok(())
    }

    /// Adds a presentation handler.
    pub fn add_handler(&self, handler: Arc<dyn PresentationHandler>) {
        self.state().handlers.push(handler);
    }

    fn launch(&self, sink: &Arc<dyn Sink>, period: Duration) -> Result<ReportCycle, MetricsSystemError> {
        sink.start()?;
        ReportCycle::spawn(
            Arc::clone(sink),
            period,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
        )
        .map_err(|source| {
            if let Err(e) = sink.stop() {
                log::warn!("Sink {} failed to stop: {}", sink.name(), e);
            }
            MetricsSystemError::Spawn {
                name: sink.name().to_string(),
                source,
            }
        })
    }

    /// Starts the cycle of every sink not yet running.
    ///
    /// A sink failing to start is logged and left idle. Returns the number of
    /// cycles started.
    pub fn start(&self) -> usize {
        let (epoch, pending) = {
            let mut state = self.state();
            state.running = true;
            let pending: Vec<(usize, Arc<dyn Sink>, Duration)> = state
                .sinks
                .iter_mut()
                .enumerate()
                .filter(|(_, m)| m.cycle.is_none() && !m.starting)
                .map(|(index, m)| {
                    m.starting = true;
                    (index, Arc::clone(&m.sink), m.period)
                })
                .collect();
            (state.epoch, pending)
        };

        let mut started = 0;
        for (index, sink, period) in pending {
            let launched = self.launch(&sink, period);
            let mut state = self.state();
            let live = state.running && state.epoch == epoch;
            let managed = &mut state.sinks[index];
            managed.starting = false;
            match launched {
                Ok(cycle) if live => {
                    managed.cycle = Some(cycle);
                    self.active.fetch_add(1, Ordering::SeqCst);
                    started += 1;
                }
                Ok(cycle) => {
                    drop(state);
                    halt(&sink, cycle);
                }
                Err(e) => log::error!("Sink {} could not be started: {}", sink.name(), e),
            }
        }
        started
    }

    /// Cancels every cycle, waits for in-flight reports, then stops the sinks.
    pub fn stop(&self) {
        let stopping: Vec<(Arc<dyn Sink>, ReportCycle)> = {
            let mut state = self.state();
            state.running = false;
            state.epoch += 1;
            let stopping: Vec<_> = state
                .sinks
                .iter_mut()
                .filter_map(|m| m.cycle.take().map(|cycle| (Arc::clone(&m.sink), cycle)))
                .collect();
            self.active.fetch_sub(stopping.len(), Ordering::SeqCst);
            stopping
        };

        // Joined outside the lock so registration never waits on a report
        for (sink, cycle) in stopping {
            halt(&sink, cycle);
        }
    }

    /// Delivers one snapshot to every sink now. Returns the successful count.
    pub fn report_all(&self) -> usize {
        let sinks = self.sinks();
        sinks
            .iter()
            .filter(|sink| deliver(sink.as_ref(), &self.registry, &self.stats))
            .count()
    }

    /// Periodic sinks in registration order.
    pub fn sinks(&self) -> Vec<Arc<dyn Sink>> {
        self.state().sinks.iter().map(|m| Arc::clone(&m.sink)).collect()
    }

    /// Presentation handlers in registration order.
    pub fn handlers(&self) -> Vec<Arc<dyn PresentationHandler>> {
        self.state().handlers.clone()
    }

    /// Number of report cycles currently attached. Never takes the state lock.
    pub fn active_cycles(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Number of periodic sinks.
    pub fn len(&self) -> usize {
        self.state().sinks.len()
    }

    /// Returns `true` if no periodic sink is managed.
    pub fn is_empty(&self) -> bool {
        self.state().sinks.is_empty()
    }
}

fn halt(sink: &Arc<dyn Sink>, mut cycle: ReportCycle) {
    cycle.stop();
    if let Err(e) = sink.stop() {
        log::warn!("Sink {} failed to stop: {}", sink.name(), e);
    }
}

impl fmt::Debug for SinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let sinks: Vec<_> = state.sinks.iter().map(|m| m.sink.name().to_string()).collect();
        let handlers: Vec<_> = state.handlers.iter().map(|h| h.path().to_string()).collect();
        f.debug_struct("SinkManager")
            .field("sinks", &sinks)
            .field("handlers", &handlers)
            .field("running", &state.running)
            .finish()
    }
}
