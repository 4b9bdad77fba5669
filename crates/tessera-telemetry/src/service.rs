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

//! The per-role metrics system.

use crate::error::{ConfigError, MetricsSystemError};
use crate::metrics::registry::LiveRegistry;
use crate::naming::NamingResolver;
use crate::presentation::PresentationHandler;
use crate::properties::{InstanceProperties, PropertyMap};
use crate::role::Role;
use crate::sinks::factory::{SinkContext, SinkFactory, SinkInstance};
use crate::sinks::manager::SinkManager;
use crate::sources::factory::SourceFactory;
use crate::sources::registry::SourceRegistry;
use crate::sources::system::SystemSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::telemetry::{Sink, Source};
use tessera_core::{ConfigView, SecurityContext};

/// Assembles a [`MetricsSystem`], optionally with custom sink and source kinds.
pub struct MetricsSystemBuilder {
    role: Role,
    config: Arc<dyn ConfigView>,
    security: Arc<dyn SecurityContext>,
    registry: Option<Arc<LiveRegistry>>,
    sink_factory: SinkFactory,
    source_factory: SourceFactory,
}

impl MetricsSystemBuilder {
    /// Starts from the built-in sink and source kinds.
    pub fn new(
        role: impl Into<Role>,
        config: Arc<dyn ConfigView>,
        security: Arc<dyn SecurityContext>,
    ) -> Self {
        Self {
            role: role.into(),
            config,
            security,
            registry: None,
            sink_factory: SinkFactory::with_builtin(),
            source_factory: SourceFactory::with_builtin(),
        }
    }

    /// Projects sources into a registry owned by the caller.
    pub fn registry(mut self, registry: Arc<LiveRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Makes `class` available to `<instance>.sink.<name>.class`.
    pub fn sink_kind<F>(mut self, class: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&SinkContext<'_>) -> Result<SinkInstance, ConfigError> + Send + Sync + 'static,
    {
        self.sink_factory.register(class, constructor);
        self
    }

    /// Makes `class` available to `<instance>.source.<name>.class`.
    pub fn source_kind<F>(mut self, class: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&str, &PropertyMap) -> Result<Arc<dyn Source>, ConfigError> + Send + Sync + 'static,
    {
        self.source_factory.register(class, constructor);
        self
    }

    /// Creates the system and registers its static sources.
    pub fn build(self) -> Result<MetricsSystem, MetricsSystemError> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(LiveRegistry::new()));
        let naming = NamingResolver::new(self.role.clone(), Arc::clone(&self.config));
        let sources = SourceRegistry::new(naming, Arc::clone(&registry));

        let system_source = Arc::new(SystemSource::new()?);
        let sinks = SinkManager::new(
            Arc::clone(&registry),
            self.security,
            system_source.report_stats(),
            self.sink_factory,
        );
        sources.register(Arc::clone(&system_source) as Arc<dyn Source>);

        let system = MetricsSystem {
            role: self.role,
            config: self.config,
            registry,
            sources,
            sinks,
            source_factory: self.source_factory,
            system_source,
            running: AtomicBool::new(false),
            configured: AtomicBool::new(false),
        };
        system.refresh_self_metrics();
        Ok(system)
    }
}

/// Collects sources of one process role and reports them to sinks.
///
/// One instance exists per process role; the caller owns it. Sources and
/// sinks may be registered before or after [`start`](Self::start). Sinks
/// declared in the configuration, and sources declared with
/// `<instance>.source.<name>.class`, are instantiated on the first start.
///
/// Calling `start` on a running system is an error. Dropping a running
/// system stops it.
#[derive(Debug)]
pub struct MetricsSystem {
    role: Role,
    config: Arc<dyn ConfigView>,
    registry: Arc<LiveRegistry>,
    sources: SourceRegistry,
    sinks: SinkManager,
    source_factory: SourceFactory,
    system_source: Arc<SystemSource>,
    running: AtomicBool,
    configured: AtomicBool,
}

impl MetricsSystem {
    /// Creates a system for `role`, projecting into `registry` when given.
    pub fn create(
        role: impl Into<Role>,
        config: Arc<dyn ConfigView>,
        security: Arc<dyn SecurityContext>,
        registry: Option<Arc<LiveRegistry>>,
    ) -> Result<Self, MetricsSystemError> {
        let builder = MetricsSystemBuilder::new(role, config, security);
        match registry {
            Some(registry) => builder.registry(registry).build(),
            None => builder.build(),
        }
    }

    /// Instantiates configured components and starts every report cycle.
    pub fn start(&self) -> Result<(), MetricsSystemError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MetricsSystemError::AlreadyRunning);
        }

        if !self.configured.swap(true, Ordering::SeqCst) {
            let properties = InstanceProperties::resolve(self.config.as_ref(), &self.role);
            self.load_sources(&properties);
            self.sinks.load_from_config(&properties);
        }

        let started = self.sinks.start();
        self.refresh_self_metrics();
        log::info!(
            "Metrics system for {} started: {} sources, {} report cycles, {} handlers",
            self.role,
            self.sources.len(),
            started,
            self.sinks.handlers().len()
        );
        Ok(())
    }

    fn load_sources(&self, properties: &InstanceProperties) {
        for (name, source_properties) in properties.sub_properties("source") {
            match self.source_factory.build(&name, &source_properties) {
                Ok(source) => {
                    self.sources.register(source);
                }
                Err(e) => log::warn!("Skipping source {}: {}", name, e),
            }
        }
    }

    /// Stops every report cycle and waits for in-flight reports.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            log::warn!("Stopping a metrics system for {} that is not running", self.role);
            return;
        }
        self.sinks.stop();
        self.refresh_self_metrics();
        log::info!("Metrics system for {} stopped", self.role);
    }

    /// Delivers one snapshot to every sink now. Returns the successful count.
    pub fn report(&self) -> usize {
        self.sinks.report_all()
    }

    /// Registers a source and returns the prefix of its metrics.
    pub fn register_source(&self, source: Arc<dyn Source>) -> String {
        let prefix = self.sources.register(source);
        self.refresh_self_metrics();
        prefix
    }

    /// Removes the most recent registration of this exact source object.
    pub fn remove_source(&self, source: &Arc<dyn Source>) -> bool {
        let removed = self.sources.remove(source);
        self.refresh_self_metrics();
        removed
    }

    /// Adds a sink reported every `period`, started at once if running.
    pub fn register_sink(
        &self,
        sink: Arc<dyn Sink>,
        period: Duration,
    ) -> Result<(), MetricsSystemError> {
        self.sinks.add(sink, period)?;
        self.refresh_self_metrics();
        Ok(())
    }

    /// Registered sources in registration order, static sources first.
    pub fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.sources.sources()
    }

    /// Registered sources called `name`.
    pub fn sources_by_name(&self, name: &str) -> Vec<Arc<dyn Source>> {
        self.sources.sources_by_name(name)
    }

    /// Periodic sinks in registration order.
    pub fn sinks(&self) -> Vec<Arc<dyn Sink>> {
        self.sinks.sinks()
    }

    /// Handlers to mount in the hosting process's HTTP layer.
    pub fn presentation_handlers(
        &self,
    ) -> Result<Vec<Arc<dyn PresentationHandler>>, MetricsSystemError> {
        if !self.is_running() {
            return Err(MetricsSystemError::NotRunning);
        }
        Ok(self.sinks.handlers())
    }

    /// The registry name `source` is (or would be) exposed under.
    pub fn build_registry_name(&self, source: &dyn Source) -> String {
        self.sources.naming().resolve(source)
    }

    /// The registry sources are projected into.
    pub fn registry(&self) -> &Arc<LiveRegistry> {
        &self.registry
    }

    /// The role of this instance.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of report cycles currently alive.
    pub fn active_report_cycles(&self) -> usize {
        self.sinks.active_cycles()
    }

    fn refresh_self_metrics(&self) {
        self.system_source
            .set_registered_sources(self.sources.len());
        self.system_source
            .set_active_sinks(self.sinks.active_cycles());
    }
}

impl Drop for MetricsSystem {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}
