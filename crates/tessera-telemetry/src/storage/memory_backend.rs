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

//! Default in-memory storage.

use crate::storage::backend::{OwnerId, RegistryBackend};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tessera_core::telemetry::{Metric, MetricRef, RegistrySnapshot};

#[derive(Debug, Clone)]
struct Entry {
    metric: MetricRef,
    owner: OwnerId,
}

/// In-memory registry backend using `RwLock<BTreeMap>`
///
/// This implementation provides:
/// - Concurrent snapshots (multiple readers, single writer)
/// - Ordered iteration by fully-qualified name
/// - Atomic batch visibility: a snapshot sees a whole batch or none of it
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: RwLock<BTreeMap<String, Entry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Names stored under `prefix.` in ascending order
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let lead = format!("{prefix}.");
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage
            .range(lead.clone()..)
            .take_while(|(name, _)| name.starts_with(&lead))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of entries per owner
    pub fn owner_counts(&self) -> BTreeMap<OwnerId, usize> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for entry in storage.values() {
            *counts.entry(entry.owner).or_insert(0) += 1;
        }
        counts
    }
}

impl RegistryBackend for InMemoryBackend {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn insert_all(&self, owner: OwnerId, entries: Vec<(String, MetricRef)>) -> Vec<String> {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let mut rejected = Vec::new();
        for (name, metric) in entries {
            match storage.get(&name) {
                Some(entry) if entry.owner == owner => {}
                Some(_) => rejected.push(name),
                None => {
                    storage.insert(name, Entry { metric, owner });
                }
            }
        }
        rejected
    }

    fn remove_owned(&self, owner: OwnerId, names: &[String]) -> usize {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for name in names {
            if storage.get(name).is_some_and(|entry| entry.owner == owner) {
                storage.remove(name);
                removed += 1;
            }
        }
        removed
    }

    fn remove_all_owned(&self, owner: OwnerId) -> usize {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let before = storage.len();
        storage.retain(|_, entry| entry.owner != owner);
        before - storage.len()
    }

    fn get(&self, name: &str) -> Option<MetricRef> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage.get(name).map(|entry| entry.metric.clone())
    }

    fn owner_of(&self, name: &str) -> Option<OwnerId> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage.get(name).map(|entry| entry.owner)
    }

    fn names(&self) -> Vec<String> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage.keys().cloned().collect()
    }

    fn snapshot(&self) -> RegistrySnapshot {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage
            .iter()
            .map(|(name, entry)| (name.clone(), entry.metric.value()))
            .collect()
    }

    fn len(&self) -> usize {
        self.storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
