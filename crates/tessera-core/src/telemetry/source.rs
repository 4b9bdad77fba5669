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

//! Metric sources and their observable metric maps.

use crate::telemetry::metrics::{
    CallbackGauge, Counter, Gauge, Histogram, Metric, MetricRef, MetricsError, MetricsResult,
};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, PoisonError, RwLock};

/// A named bundle of metrics owned by some subsystem.
///
/// The metrics system only reads from a source's [`MetricSet`] and subscribes
/// to its change notifications; it never adds or removes metrics itself.
pub trait Source: Send + Sync + Debug {
    /// The name used as the last component of the registry prefix.
    fn source_name(&self) -> &str;

    /// The live metric map of this source.
    fn metrics(&self) -> &MetricSet;
}

/// Receives change notifications from a [`MetricSet`].
///
/// Callbacks run while the set holds its write lock, so every subscriber
/// observes changes in the same order. A listener must not call back into the
/// set that notifies it.
pub trait MetricSetListener: Send + Sync {
    /// A metric was added under `name`.
    fn on_metric_added(&self, name: &str, metric: &MetricRef);

    /// The metric under `name` was removed.
    fn on_metric_removed(&self, name: &str, metric: &MetricRef);

    /// Called once on subscription with every metric currently present.
    fn on_subscribed(&self, current: &[(String, MetricRef)]) {
        for (name, metric) in current {
            self.on_metric_added(name, metric);
        }
    }
}

/// Identifies a listener attached to a [`MetricSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct MetricSetInner {
    metrics: BTreeMap<String, MetricRef>,
    listeners: Vec<(SubscriptionId, Arc<dyn MetricSetListener>)>,
    next_subscription: u64,
}

/// A name-to-metric map that notifies subscribers of every change.
#[derive(Default)]
pub struct MetricSet {
    inner: RwLock<MetricSetInner>,
}

impl MetricSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `metric` under `name` and returns it, typed, for the caller to update.
    pub fn register<M: Metric>(&self, name: impl Into<String>, metric: Arc<M>) -> MetricsResult<Arc<M>> {
        let shared: MetricRef = metric.clone();
        self.insert(name, shared)?;
        Ok(metric)
    }

    /// Adds a type-erased metric under `name`.
    ///
    /// Names are unique within one set; an existing entry is never replaced.
    pub fn insert(&self, name: impl Into<String>, metric: MetricRef) -> MetricsResult<()> {
        let name = name.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.metrics.contains_key(&name) {
            return Err(MetricsError::DuplicateName(name));
        }
        for (_, listener) in &inner.listeners {
            listener.on_metric_added(&name, &metric);
        }
        inner.metrics.insert(name, metric);
        Ok(())
    }

    /// Registers a new counter under `name`.
    pub fn counter(&self, name: impl Into<String>) -> MetricsResult<Arc<Counter>> {
        self.register(name, Arc::new(Counter::new()))
    }

    /// Registers a new settable gauge under `name`.
    pub fn gauge(&self, name: impl Into<String>) -> MetricsResult<Arc<Gauge>> {
        self.register(name, Arc::new(Gauge::new()))
    }

    /// Registers a gauge computed by `read` under `name`.
    pub fn callback_gauge(
        &self,
        name: impl Into<String>,
        read: impl Fn() -> f64 + Send + Sync + 'static,
    ) -> MetricsResult<Arc<CallbackGauge>> {
        self.register(name, Arc::new(CallbackGauge::new(read)))
    }

    /// Registers a histogram with the given bucket bounds under `name`.
    pub fn histogram(
        &self,
        name: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> MetricsResult<Arc<Histogram>> {
        self.register(name, Arc::new(Histogram::new(bucket_bounds)))
    }

    /// Removes the metric stored under `name`.
    pub fn remove(&self, name: &str) -> MetricsResult<MetricRef> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let metric = inner
            .metrics
            .remove(name)
            .ok_or_else(|| MetricsError::NotFound(name.to_string()))?;
        for (_, listener) in &inner.listeners {
            listener.on_metric_removed(name, &metric);
        }
        Ok(metric)
    }

    /// Returns the metric stored under `name`.
    pub fn get(&self, name: &str) -> Option<MetricRef> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.metrics.get(name).cloned()
    }

    /// Returns the metric names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.metrics.keys().cloned().collect()
    }

    /// Number of metrics in the set.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .metrics
            .len()
    }

    /// Returns `true` if the set holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches `listener` and replays the current content to it.
    ///
    /// Attachment and replay happen under the same lock: no change can slip
    /// between the replayed content and the first live notification.
    pub fn subscribe(&self, listener: Arc<dyn MetricSetListener>) -> SubscriptionId {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;

        let current: Vec<(String, MetricRef)> = inner
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), Arc::clone(metric)))
            .collect();
        listener.on_subscribed(&current);

        inner.listeners.push((id, listener));
        id
    }

    /// Replays the current content to an attached listener, under the same
    /// lock as [`subscribe`](Self::subscribe). Returns `false` if `id` is not
    /// attached.
    pub fn replay(&self, id: SubscriptionId) -> bool {
        let inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some((_, listener)) = inner.listeners.iter().find(|(sid, _)| *sid == id) else {
            return false;
        };

        let current: Vec<(String, MetricRef)> = inner
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), Arc::clone(metric)))
            .collect();
        listener.on_subscribed(&current);
        true
    }

    /// Detaches a listener. Returns `false` if it was not attached.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.listeners.len();
        inner.listeners.retain(|(sid, _)| *sid != id);
        inner.listeners.len() != before
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

impl Debug for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MetricSet")
            .field("metrics", &inner.metrics.keys().collect::<Vec<_>>())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

/// A ready-made [`Source`]: a name plus an owned [`MetricSet`].
#[derive(Debug)]
pub struct SimpleSource {
    name: String,
    metrics: MetricSet,
}

impl SimpleSource {
    /// Creates a source with an empty metric set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: MetricSet::new(),
        }
    }
}

impl Source for SimpleSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &MetricSet {
        &self.metrics
    }
}
