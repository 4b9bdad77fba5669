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

//! The storage contract behind [`LiveRegistry`](crate::LiveRegistry).

use std::fmt::Debug;
use tessera_core::telemetry::{MetricRef, RegistrySnapshot};

/// Identifies the registration that projected an entry into the registry.
///
/// Removal is always scoped to an owner, so one registration can never
/// retract entries that another registration put in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

/// Trait defining the interface for central registry storage.
///
/// Batch operations must be atomic with respect to [`snapshot`]: a reader
/// sees either all of a batch or none of it.
///
/// [`snapshot`]: RegistryBackend::snapshot
pub trait RegistryBackend: Send + Sync + Debug + 'static {
    /// Get a reference to this object as Any for downcasting
    fn as_any(&self) -> &dyn std::any::Any;

    /// Insert every entry not already present, tagging it with `owner`.
    ///
    /// Names `owner` already holds are left as they are. Returns the names
    /// rejected because another owner holds them.
    fn insert_all(&self, owner: OwnerId, entries: Vec<(String, MetricRef)>) -> Vec<String>;

    /// Remove the listed names that belong to `owner`. Returns how many were removed.
    fn remove_owned(&self, owner: OwnerId, names: &[String]) -> usize;

    /// Remove every entry belonging to `owner`. Returns how many were removed.
    fn remove_all_owned(&self, owner: OwnerId) -> usize;

    /// Retrieve a metric by fully-qualified name
    fn get(&self, name: &str) -> Option<MetricRef>;

    /// The owner of an entry, if present
    fn owner_of(&self, name: &str) -> Option<OwnerId>;

    /// Get all names currently stored, in ascending order
    fn names(&self) -> Vec<String>;

    /// Read every metric in one consistent pass
    fn snapshot(&self) -> RegistrySnapshot;

    /// Get the number of entries stored
    fn len(&self) -> usize;

    // Convenience methods

    /// Check if a metric exists
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Check if the backend holds nothing
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
