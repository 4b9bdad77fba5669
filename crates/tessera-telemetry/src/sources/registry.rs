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

//! Registry for managing metric sources.

use crate::metrics::registry::LiveRegistry;
use crate::naming::NamingResolver;
use crate::storage::backend::OwnerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tessera_core::telemetry::{MetricRef, MetricSetListener, Source, SubscriptionId};

/// Mirrors one source's metric set into the central registry under a prefix.
struct SourceProjection {
    registry: Arc<LiveRegistry>,
    owner: OwnerId,
    prefix: String,
    /// Set when a name was left to another registration.
    contested: AtomicBool,
}

impl SourceProjection {
    fn project(&self, metrics: &[(String, MetricRef)]) {
        if self.registry.project(self.owner, &self.prefix, metrics) < metrics.len() {
            self.contested.store(true, Ordering::SeqCst);
        }
    }
}

impl MetricSetListener for SourceProjection {
    fn on_metric_added(&self, name: &str, metric: &MetricRef) {
        self.project(&[(name.to_string(), Arc::clone(metric))]);
    }

    fn on_metric_removed(&self, name: &str, _metric: &MetricRef) {
        self.registry.retract(self.owner, &self.prefix, &[name]);
    }

    fn on_subscribed(&self, current: &[(String, MetricRef)]) {
        // One batch, so a snapshot never sees half of the source
        self.project(current);
    }
}

struct Registration {
    source: Arc<dyn Source>,
    prefix: String,
    projection: Arc<SourceProjection>,
    subscription: SubscriptionId,
}

impl Registration {
    fn detach(&self, registry: &LiveRegistry) {
        self.source.metrics().unsubscribe(self.subscription);
        registry.retract_owner(self.projection.owner);
    }

    /// Projects again the names another registration used to hold.
    fn reclaim(&self) {
        if self.projection.contested.swap(false, Ordering::SeqCst) {
            self.source.metrics().replay(self.subscription);
        }
    }
}

/// A thread-safe registry of metric sources.
///
/// Registering a source subscribes to its metric set: metrics present now and
/// metrics added later are projected into the [`LiveRegistry`] as
/// `<prefix>.<local name>`, and metrics removed from the source disappear from
/// it. Registrations are kept in order and are not deduplicated; registering
/// two sources that resolve to the same prefix leaves the clashing names with
/// the first registration. Removing that registration hands them over to the
/// earliest remaining one that holds the same names.
pub struct SourceRegistry {
    naming: NamingResolver,
    registry: Arc<LiveRegistry>,
    registrations: Mutex<Vec<Registration>>,
}

impl SourceRegistry {
    /// Creates an empty source registry projecting into `registry`.
    pub fn new(naming: NamingResolver, registry: Arc<LiveRegistry>) -> Self {
        Self {
            naming,
            registry,
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Registers a source and returns the prefix its metrics are exposed under.
    pub fn register(&self, source: Arc<dyn Source>) -> String {
        let prefix = self.naming.resolve(source.as_ref());
        let owner = self.registry.allocate_owner();
        let projection = Arc::new(SourceProjection {
            registry: Arc::clone(&self.registry),
            owner,
            prefix: prefix.clone(),
            contested: AtomicBool::new(false),
        });

        let mut registrations = self.lock();
        let subscription = source
            .metrics()
            .subscribe(Arc::clone(&projection) as Arc<dyn MetricSetListener>);
        log::info!(
            "Registered metrics source {} as {}",
            source.source_name(),
            prefix
        );
        registrations.push(Registration {
            source,
            prefix: prefix.clone(),
            projection,
            subscription,
        });
        prefix
    }

    /// Removes the most recent registration of this exact source object.
    pub fn remove(&self, source: &Arc<dyn Source>) -> bool {
        let mut registrations = self.lock();
        let Some(index) = registrations
            .iter()
            .rposition(|r| std::ptr::addr_eq(Arc::as_ptr(&r.source), Arc::as_ptr(source)))
        else {
            return false;
        };

        let registration = registrations.remove(index);
        registration.detach(&self.registry);
        for remaining in registrations.iter() {
            remaining.reclaim();
        }
        log::info!(
            "Removed metrics source {} ({})",
            registration.source.source_name(),
            registration.prefix
        );
        true
    }

    /// Returns all registered sources in registration order.
    pub fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.lock().iter().map(|r| Arc::clone(&r.source)).collect()
    }

    /// Returns the registered sources called `name`.
    pub fn sources_by_name(&self, name: &str) -> Vec<Arc<dyn Source>> {
        self.lock()
            .iter()
            .filter(|r| r.source.source_name() == name)
            .map(|r| Arc::clone(&r.source))
            .collect()
    }

    /// Returns the prefixes of all registrations in registration order.
    pub fn prefixes(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.prefix.clone()).collect()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no source is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detaches every source and retracts all of their projections.
    pub fn clear(&self) {
        let registrations = std::mem::take(&mut *self.lock());
        for registration in &registrations {
            registration.detach(&self.registry);
        }
    }

    /// The naming resolver used for prefixes.
    pub fn naming(&self) -> &NamingResolver {
        &self.naming
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SourceRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("prefixes", &self.prefixes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use tessera_core::config::keys;
    use tessera_core::telemetry::{Metric, MetricValue, SimpleSource};
    use tessera_core::MetricsConfig;

    fn worker_registry() -> (SourceRegistry, Arc<LiveRegistry>) {
        let config = MetricsConfig::new()
            .with(keys::APPLICATION_ID, "app")
            .with(keys::EXECUTOR_ID, "3");
        let naming = NamingResolver::new(Role::worker(), Arc::new(config));
        let live = Arc::new(LiveRegistry::new());
        (SourceRegistry::new(naming, Arc::clone(&live)), live)
    }

    #[test]
    fn test_register_projects_existing_metrics() {
        let (sources, live) = worker_registry();
        let source = Arc::new(SimpleSource::new("shuffle"));
        let fetched = source.metrics().counter("blocks_fetched").unwrap();
        fetched.inc_by(2);

        let prefix = sources.register(source.clone());

        assert_eq!(prefix, "app.3.shuffle");
        assert_eq!(sources.len(), 1);
        assert_eq!(
            live.get("app.3.shuffle.blocks_fetched").unwrap().value(),
            MetricValue::Counter(2)
        );
    }

    #[test]
    fn test_metrics_added_later_become_visible() {
        let (sources, live) = worker_registry();
        let source = Arc::new(SimpleSource::new("late"));
        sources.register(source.clone());
        assert!(live.names_with_prefix("app.3.late").is_empty());

        let gauge = source.metrics().gauge("m").unwrap();
        gauge.set(3.5);

        let stored = live.get("app.3.late.m").unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&stored), Arc::as_ptr(&gauge)));
        assert_eq!(stored.value(), MetricValue::Gauge(3.5));
    }

    #[test]
    fn test_metrics_removed_from_source_disappear() {
        let (sources, live) = worker_registry();
        let source = Arc::new(SimpleSource::new("src"));
        source.metrics().counter("a").unwrap();
        source.metrics().counter("b").unwrap();
        sources.register(source.clone());

        source.metrics().remove("a").unwrap();

        assert_eq!(live.names(), vec!["app.3.src.b".to_string()]);
    }

    #[test]
    fn test_remove_source_detaches() {
        let (sources, live) = worker_registry();
        let source = Arc::new(SimpleSource::new("src"));
        source.metrics().counter("a").unwrap();
        let handle: Arc<dyn Source> = source.clone();
        sources.register(handle.clone());

        assert!(sources.remove(&handle));
        assert!(!sources.remove(&handle));
        assert_eq!(live.metric_count(), 0);
        assert_eq!(source.metrics().listener_count(), 0);

        // Later additions no longer reach the registry
        source.metrics().counter("b").unwrap();
        assert_eq!(live.metric_count(), 0);
    }

    #[test]
    fn test_duplicate_registrations_coexist() {
        let (sources, live) = worker_registry();
        let first = Arc::new(SimpleSource::new("dup"));
        let second = Arc::new(SimpleSource::new("dup"));
        let kept = first.metrics().counter("m").unwrap();
        second.metrics().counter("m").unwrap();
        second.metrics().counter("only_second").unwrap();

        sources.register(first.clone());
        sources.register(second.clone());

        assert_eq!(sources.sources_by_name("dup").len(), 2);
        let stored = live.get("app.3.dup.m").unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&stored), Arc::as_ptr(&kept)));
        assert!(live.contains("app.3.dup.only_second"));

        // Removing the second registration leaves the first one's entries alone
        let second: Arc<dyn Source> = second;
        sources.remove(&second);
        assert!(live.contains("app.3.dup.m"));
        assert!(!live.contains("app.3.dup.only_second"));
    }

    #[test]
    fn test_clashing_names_move_to_remaining_registration() {
        let (sources, live) = worker_registry();
        let first = Arc::new(SimpleSource::new("dup"));
        let second = Arc::new(SimpleSource::new("dup"));
        first.metrics().counter("m").unwrap();
        let takeover = second.metrics().counter("m").unwrap();
        takeover.inc_by(4);

        let first_handle: Arc<dyn Source> = first.clone();
        sources.register(first_handle.clone());
        sources.register(second.clone());

        assert!(sources.remove(&first_handle));
        let stored = live.get("app.3.dup.m").unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&stored), Arc::as_ptr(&takeover)));
        assert_eq!(stored.value(), MetricValue::Counter(4));

        // The new holder keeps forwarding removals
        second.metrics().remove("m").unwrap();
        assert!(!live.contains("app.3.dup.m"));
    }

    #[test]
    fn test_order_and_clear() {
        let (sources, live) = worker_registry();
        for name in ["a", "b", "c"] {
            let source = Arc::new(SimpleSource::new(name));
            source.metrics().counter("m").unwrap();
            sources.register(source);
        }

        let names: Vec<_> = sources
            .sources()
            .iter()
            .map(|s| s.source_name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        sources.clear();
        assert!(sources.is_empty());
        assert_eq!(live.metric_count(), 0);
    }
}
