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

//! Instantiation of sources declared in configuration.
//!
//! `<instance>.source.<name>.class=<class>` declares a source; the class
//! selects a constructor registered here.

use crate::error::ConfigError;
use crate::properties::PropertyMap;
use crate::sources::process::ProcessSource;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tessera_core::telemetry::Source;

/// Builds a source from its configured name and properties.
pub type SourceConstructor =
    Arc<dyn Fn(&str, &PropertyMap) -> Result<Arc<dyn Source>, ConfigError> + Send + Sync>;

/// Maps `class` values to source constructors.
#[derive(Clone, Default)]
pub struct SourceFactory {
    constructors: BTreeMap<String, SourceConstructor>,
}

impl SourceFactory {
    /// Class of the built-in process source.
    pub const PROCESS: &'static str = "process";

    /// A factory without any class.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A factory knowing the built-in classes.
    pub fn with_builtin() -> Self {
        let mut factory = Self::empty();
        factory.register(Self::PROCESS, |name, _props| {
            Ok(Arc::new(ProcessSource::new(name)?) as Arc<dyn Source>)
        });
        factory
    }

    /// Registers (or replaces) the constructor for `class`.
    pub fn register<F>(&mut self, class: impl Into<String>, constructor: F)
    where
        F: Fn(&str, &PropertyMap) -> Result<Arc<dyn Source>, ConfigError> + Send + Sync + 'static,
    {
        self.constructors.insert(class.into(), Arc::new(constructor));
    }

    /// Instantiates the source `name` described by `properties`.
    pub fn build(&self, name: &str, properties: &PropertyMap) -> Result<Arc<dyn Source>, ConfigError> {
        let class = properties
            .get("class")
            .ok_or_else(|| ConfigError::MissingProperty {
                component: "source",
                name: name.to_string(),
                property: "class",
            })?;
        let constructor = self
            .constructors
            .get(class.trim())
            .ok_or_else(|| ConfigError::UnknownClass {
                component: "source",
                name: name.to_string(),
                class: class.clone(),
            })?;
        constructor(name, properties)
    }

    /// Known classes in ascending order.
    pub fn classes(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for SourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFactory")
            .field("classes", &self.classes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::telemetry::SimpleSource;

    fn props(pairs: &[(&str, &str)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_process_source() {
        let factory = SourceFactory::with_builtin();
        let source = factory
            .build("proc", &props(&[("class", "process")]))
            .unwrap();
        assert_eq!(source.source_name(), "proc");
        assert_eq!(factory.classes(), vec!["process"]);
    }

    #[test]
    fn test_missing_and_unknown_class() {
        let factory = SourceFactory::with_builtin();
        assert!(matches!(
            factory.build("x", &PropertyMap::new()),
            Err(ConfigError::MissingProperty { property: "class", .. })
        ));
        assert!(matches!(
            factory.build("x", &props(&[("class", "jvm")])),
            Err(ConfigError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_custom_class() {
        let mut factory = SourceFactory::empty();
        factory.register("static", |name, props| {
            let source = SimpleSource::new(name);
            if let Some(initial) = props.get("initial") {
                let gauge = source.metrics().gauge("value")?;
                gauge.set(initial.parse().unwrap_or(0.0));
            }
            Ok(Arc::new(source) as Arc<dyn Source>)
        });

        let source = factory
            .build("fixed", &props(&[("class", "static"), ("initial", "2.5")]))
            .unwrap();
        assert_eq!(source.metrics().len(), 1);
    }
}
