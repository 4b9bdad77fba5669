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

//! Role of the process instance hosting a metrics system.

use std::fmt::{self, Display};

/// The logical function of a process instance.
///
/// The role selects the naming branch applied to sources and scopes the
/// `<role>.sink.*` / `<role>.source.*` configuration keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(String);

impl Role {
    /// The coordinating process of an application.
    pub const COORDINATOR: &'static str = "coordinator-role";
    /// A process executing work on behalf of an application.
    pub const WORKER: &'static str = "worker-role";

    /// Creates a role from its configuration name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The coordinator role.
    pub fn coordinator() -> Self {
        Self::new(Self::COORDINATOR)
    }

    /// The worker role.
    pub fn worker() -> Self {
        Self::new(Self::WORKER)
    }

    /// The configuration name of this role.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for roles whose sources are prefixed with the
    /// application root and executor identifier.
    pub fn is_privileged(&self) -> bool {
        matches!(self.0.as_str(), Self::COORDINATOR | Self::WORKER)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}
