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

//! The central, continuously updated registry.

use crate::storage::backend::{OwnerId, RegistryBackend};
use crate::storage::memory_backend::InMemoryBackend;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::telemetry::{MetricRef, RegistrySnapshot};

/// Central registry mapping fully-qualified names to metric objects.
///
/// Entries are the metric objects owned by sources, never copies. Every entry
/// carries the [`OwnerId`] of the registration that projected it, and an
/// existing entry is never overwritten: a clashing name is reported and the
/// first entry stays in place.
///
/// A registry can be shared between several metrics systems, or handed in by
/// a caller that already owns one, through [`LiveRegistry::with_backend`] and
/// `Arc` sharing.
#[derive(Debug)]
pub struct LiveRegistry {
    backend: Arc<dyn RegistryBackend>,
    next_owner: AtomicU64,
}

/// Joins a registry prefix and a local metric name.
pub fn qualified_name(prefix: &str, local_name: &str) -> String {
    format!("{prefix}.{local_name}")
}

impl LiveRegistry {
    /// Create a new registry with the default in-memory backend
    pub fn new() -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()))
    }

    /// Create a new registry with a custom backend
    pub fn with_backend(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            next_owner: AtomicU64::new(1),
        }
    }

    /// Hands out a fresh owner tag for a new registration.
    pub fn allocate_owner(&self) -> OwnerId {
        OwnerId(self.next_owner.fetch_add(1, Ordering::Relaxed))
    }

    /// Projects local metrics under `prefix` in one atomic batch.
    ///
    /// Returns how many of the names `owner` now holds. Names held by another
    /// owner are logged and skipped; names `owner` already holds are kept.
    pub fn project(&self, owner: OwnerId, prefix: &str, metrics: &[(String, MetricRef)]) -> usize {
        let entries: Vec<(String, MetricRef)> = metrics
            .iter()
            .map(|(local, metric)| (qualified_name(prefix, local), Arc::clone(metric)))
            .collect();
        let total = entries.len();

        let rejected = self.backend.insert_all(owner, entries);
        for name in &rejected {
            log::warn!("Metric {name} is already registered, keeping the existing entry");
        }
        total - rejected.len()
    }

    /// Removes projections of `local_names` under `prefix` made by `owner`.
    pub fn retract(&self, owner: OwnerId, prefix: &str, local_names: &[&str]) -> usize {
        let names: Vec<String> = local_names
            .iter()
            .map(|local| qualified_name(prefix, local))
            .collect();
        self.backend.remove_owned(owner, &names)
    }

    /// Removes every projection made by `owner`.
    pub fn retract_owner(&self, owner: OwnerId) -> usize {
        self.backend.remove_all_owned(owner)
    }

    /// Get a metric by fully-qualified name
    pub fn get(&self, name: &str) -> Option<MetricRef> {
        self.backend.get(name)
    }

    /// Check if a metric exists
    pub fn contains(&self, name: &str) -> bool {
        self.backend.contains(name)
    }

    /// All fully-qualified names in ascending order
    pub fn names(&self) -> Vec<String> {
        self.backend.names()
    }

    /// Names projected under `prefix`
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        if let Some(memory_backend) = self
            .backend
            .as_ref()
            .as_any()
            .downcast_ref::<InMemoryBackend>()
        {
            memory_backend.names_with_prefix(prefix)
        } else {
            let lead = format!("{prefix}.");
            self.backend
                .names()
                .into_iter()
                .filter(|name| name.starts_with(&lead))
                .collect()
        }
    }

    /// Get the total number of metrics
    pub fn metric_count(&self) -> usize {
        self.backend.len()
    }

    /// Read every metric in one consistent pass
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.backend.snapshot()
    }

    /// Get direct access to the backend (for advanced operations)
    pub fn backend(&self) -> &Arc<dyn RegistryBackend> {
        &self.backend
    }
}

impl Default for LiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}
