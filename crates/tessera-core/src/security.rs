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

//! Access control hook for presentation handlers.
//!
//! Authentication and authorization live outside the metrics system; the
//! only question asked here is whether a given viewer may read the registry.

use std::collections::BTreeSet;
use std::fmt::Debug;

/// Decides whether a viewer may read metrics exposed by a presentation handler.
pub trait SecurityContext: Send + Sync + Debug {
    /// Returns `true` if `user` (or an anonymous viewer when `None`) may view metrics.
    fn can_view(&self, user: Option<&str>) -> bool;
}

/// Grants access to everybody, including anonymous viewers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl SecurityContext for AllowAll {
    fn can_view(&self, _user: Option<&str>) -> bool {
        true
    }
}

/// Grants access to an explicit list of users.
///
/// The entry `"*"` admits every authenticated user. Anonymous viewers are
/// never admitted.
#[derive(Debug, Default, Clone)]
pub struct AclSecurity {
    view_acls: BTreeSet<String>,
}

impl AclSecurity {
    /// Creates an ACL admitting the given users.
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            view_acls: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl SecurityContext for AclSecurity {
    fn can_view(&self, user: Option<&str>) -> bool {
        match user {
            Some(user) => self.view_acls.contains("*") || self.view_acls.contains(user),
            None => false,
        }
    }
}
