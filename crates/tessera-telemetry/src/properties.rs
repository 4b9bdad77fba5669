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

//! Per-instance view of the sink and source configuration.
//!
//! Keys have the shape `<instance>.<kind>.<name>.<property>`, where the
//! instance is either a role name or the wildcard `*`. Values scoped to the
//! role override wildcard values property by property.

use crate::role::Role;
use std::collections::BTreeMap;
use tessera_core::ConfigView;

/// Instance name matching every role.
pub const WILDCARD_INSTANCE: &str = "*";

/// Properties of one configured sink or source, keyed by property name.
pub type PropertyMap = BTreeMap<String, String>;

/// The configuration entries that apply to one role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceProperties {
    values: BTreeMap<String, String>,
}

impl InstanceProperties {
    /// Collects the entries for `role`, stripped of their instance prefix.
    pub fn resolve(config: &dyn ConfigView, role: &Role) -> Self {
        let mut wildcard = BTreeMap::new();
        let mut scoped = BTreeMap::new();

        for (key, value) in config.entries() {
            let Some((instance, rest)) = key.split_once('.') else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            if instance == WILDCARD_INSTANCE {
                wildcard.insert(rest.to_string(), value.to_string());
            } else if instance == role.as_str() {
                scoped.insert(rest.to_string(), value.to_string());
            }
        }

        wildcard.extend(scoped);
        Self { values: wildcard }
    }

    /// The value of an instance-relative key such as `sink.console.period`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Groups `<kind>.<name>.<property>` entries by name.
    ///
    /// The property is the last dot-separated segment, so names may contain dots.
    pub fn sub_properties(&self, kind: &str) -> BTreeMap<String, PropertyMap> {
        let mut groups: BTreeMap<String, PropertyMap> = BTreeMap::new();
        for (key, value) in &self.values {
            let Some(rest) = key
                .strip_prefix(kind)
                .and_then(|rest| rest.strip_prefix('.'))
            else {
                continue;
            };
            let Some((name, property)) = rest.rsplit_once('.') else {
                continue;
            };
            if name.is_empty() || property.is_empty() {
                continue;
            }
            groups
                .entry(name.to_string())
                .or_default()
                .insert(property.to_string(), value.clone());
        }
        groups
    }

    /// Number of entries applying to the role.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing applies to the role.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::MetricsConfig;

    fn config() -> MetricsConfig {
        MetricsConfig::new()
            .with("*.sink.console.class", "console")
            .with("*.sink.console.period", "10")
            .with("worker-role.sink.console.period", "20")
            .with("worker-role.sink.csv.class", "csv")
            .with("worker-role.sink.csv.directory", "/tmp/metrics")
            .with("coordinator-role.sink.log.class", "log")
            .with("*.source.process.class", "process")
            .with("application.id", "app")
    }

    #[test]
    fn test_role_overrides_wildcard() {
        let props = InstanceProperties::resolve(&config(), &Role::worker());
        assert_eq!(props.get("sink.console.period"), Some("20"));
        assert_eq!(props.get("sink.console.class"), Some("console"));
        assert_eq!(props.get("sink.log.class"), None);
    }

    #[test]
    fn test_sink_groups() {
        let props = InstanceProperties::resolve(&config(), &Role::worker());
        let sinks = props.sub_properties("sink");

        assert_eq!(sinks.keys().collect::<Vec<_>>(), vec!["console", "csv"]);
        assert_eq!(sinks["console"]["period"], "20");
        assert_eq!(sinks["csv"]["directory"], "/tmp/metrics");
    }

    #[test]
    fn test_other_role_sees_only_wildcard_and_own() {
        let props = InstanceProperties::resolve(&config(), &Role::coordinator());
        let sinks = props.sub_properties("sink");

        assert_eq!(sinks.keys().collect::<Vec<_>>(), vec!["console", "log"]);
        assert_eq!(sinks["console"]["period"], "10");
        assert_eq!(props.sub_properties("source")["process"]["class"], "process");
    }

    #[test]
    fn test_names_keep_inner_dots() {
        let config = MetricsConfig::new().with("*.sink.graphite.eu.host", "10.0.0.1");
        let props = InstanceProperties::resolve(&config, &Role::new("history"));
        let sinks = props.sub_properties("sink");
        assert_eq!(sinks["graphite.eu"]["host"], "10.0.0.1");
    }

    #[test]
    fn test_malformed_keys_ignored() {
        let config = MetricsConfig::new()
            .with("*", "x")
            .with("*.", "x")
            .with("*.sink.", "x")
            .with("*.sink.noproperty", "x")
            .with("*.sinks.a.class", "x");
        let props = InstanceProperties::resolve(&config, &Role::worker());
        assert!(props.sub_properties("sink").is_empty());
    }
}
