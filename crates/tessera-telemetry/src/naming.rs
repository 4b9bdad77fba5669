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

//! Canonical registry names for sources.
//!
//! For the coordinator and worker roles, a source named `S` is exposed as
//! `<root>.<executor id>.S`, where the root is the expanded
//! `metrics.namespace` template if that key is configured, or the
//! application identifier otherwise. Every other role, and every privileged
//! role lacking the required identifiers, uses the bare source name.

use crate::role::Role;
use std::sync::Arc;
use tessera_core::config::keys;
use tessera_core::telemetry::Source;
use tessera_core::ConfigView;

/// Computes registry prefixes for one role and configuration.
#[derive(Debug, Clone)]
pub struct NamingResolver {
    role: Role,
    config: Arc<dyn ConfigView>,
}

impl NamingResolver {
    /// Binds a resolver to a role and configuration.
    pub fn new(role: Role, config: Arc<dyn ConfigView>) -> Self {
        Self { role, config }
    }

    /// The canonical registry name for `source`.
    pub fn resolve(&self, source: &dyn Source) -> String {
        self.resolve_name(source.source_name())
    }

    /// The canonical registry name for a source called `source_name`.
    pub fn resolve_name(&self, source_name: &str) -> String {
        build_registry_name(&self.role, self.config.as_ref(), source_name)
    }
}

/// Resolves the registry name of a source.
pub fn build_registry_name(role: &Role, config: &dyn ConfigView, source_name: &str) -> String {
    if !role.is_privileged() {
        return source_name.to_string();
    }

    let Some(executor_id) = config.get(keys::EXECUTOR_ID) else {
        log::debug!(
            "Using default name {source_name} for source because {} is not set",
            keys::EXECUTOR_ID
        );
        return source_name.to_string();
    };

    let root = if config.contains_key(keys::METRICS_NAMESPACE) {
        let template = config.get(keys::METRICS_NAMESPACE).unwrap_or_default();
        expand_template(template, config)
    } else if let Some(app_id) = config.get(keys::APPLICATION_ID) {
        app_id.to_string()
    } else {
        log::debug!(
            "Using default name {source_name} for source because neither {} nor {} is set",
            keys::METRICS_NAMESPACE,
            keys::APPLICATION_ID
        );
        return source_name.to_string();
    };

    format!("{root}.{executor_id}.{source_name}")
}

/// Substitutes `${key}` placeholders with configuration values.
///
/// A single left-to-right pass: substituted values are not expanded again,
/// and a placeholder whose key is absent (or malformed) stays verbatim,
/// delimiters included.
pub fn expand_template(template: &str, config: &dyn ConfigView) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("${") {
        expanded.push_str(&rest[..open]);
        let body = &rest[open + 2..];
        let Some(close) = body.find('}') else {
            // Unterminated placeholder
            expanded.push_str(&rest[open..]);
            return expanded;
        };

        let key = &body[..close];
        let value = if key.is_empty() || key.contains(char::is_whitespace) {
            None
        } else {
            config.get(key)
        };
        match value {
            Some(value) => expanded.push_str(value),
            None => expanded.push_str(&rest[open..open + 2 + close + 1]),
        }
        rest = &body[close + 1..];
    }

    expanded.push_str(rest);
    expanded
}
