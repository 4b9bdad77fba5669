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

//! Instantiation of sinks declared in configuration.
//!
//! `<instance>.sink.<name>.class=<class>` declares a sink. Periodic classes
//! also read `period` (default 10) and `unit` (default seconds).

use crate::error::ConfigError;
use crate::metrics::registry::LiveRegistry;
use crate::presentation::json::JsonHandler;
use crate::presentation::prometheus::PrometheusHandler;
use crate::presentation::PresentationHandler;
use crate::properties::PropertyMap;
use crate::sinks::console::ConsoleSink;
use crate::sinks::csv::CsvSink;
use crate::sinks::log::LogSink;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::telemetry::Sink;
use tessera_core::SecurityContext;

/// Shortest accepted reporting period.
pub const MINIMAL_PERIOD: Duration = Duration::from_secs(1);

/// Reporting period used when `period` is not configured.
pub const DEFAULT_PERIOD: u64 = 10;

/// Everything a sink constructor may need.
pub struct SinkContext<'a> {
    /// Configured sink name.
    pub name: &'a str,
    /// Merged properties of the sink.
    pub properties: &'a PropertyMap,
    /// The registry the sink reports.
    pub registry: &'a Arc<LiveRegistry>,
    /// Access control for presentation handlers.
    pub security: &'a Arc<dyn SecurityContext>,
}

impl SinkContext<'_> {
    /// An optional property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// A mandatory property.
    pub fn require(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.property(key).ok_or_else(|| ConfigError::MissingProperty {
            component: "sink",
            name: self.name.to_string(),
            property: key,
        })
    }

    /// The configured reporting period.
    pub fn report_period(&self) -> Result<Duration, ConfigError> {
        parse_period(self.name, self.properties)
    }
}

/// What a sink constructor produces.
pub enum SinkInstance {
    /// A sink reported on its own timer.
    Periodic {
        /// The sink.
        sink: Arc<dyn Sink>,
        /// Time between two reports.
        period: Duration,
    },
    /// A handler rendering the registry on request.
    Presentation(Arc<dyn PresentationHandler>),
}

/// Builds a sink from its context.
pub type SinkConstructor =
    Arc<dyn Fn(&SinkContext<'_>) -> Result<SinkInstance, ConfigError> + Send + Sync>;

/// Maps `class` values to sink constructors.
#[derive(Clone, Default)]
pub struct SinkFactory {
    constructors: BTreeMap<String, SinkConstructor>,
}

impl SinkFactory {
    /// Plain-text reports on standard output.
    pub const CONSOLE: &'static str = "console";
    /// Reports through the `log` facade.
    pub const LOG: &'static str = "log";
    /// One CSV file per metric.
    pub const CSV: &'static str = "csv";
    /// JSON presentation handler.
    pub const SERVLET: &'static str = "servlet";
    /// Prometheus text presentation handler.
    pub const PROMETHEUS: &'static str = "prometheus";

    /// A factory without any class.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A factory knowing the built-in classes.
    pub fn with_builtin() -> Self {
        let mut factory = Self::empty();
        factory.register(Self::CONSOLE, |ctx| {
            Ok(SinkInstance::Periodic {
                sink: Arc::new(ConsoleSink::new(ctx.name)),
                period: ctx.report_period()?,
            })
        });
        factory.register(Self::LOG, |ctx| {
            let target = ctx.property("target").unwrap_or(LogSink::DEFAULT_TARGET);
            Ok(SinkInstance::Periodic {
                sink: Arc::new(LogSink::new(ctx.name, target)),
                period: ctx.report_period()?,
            })
        });
        factory.register(Self::CSV, |ctx| {
            let directory = ctx.require("directory")?;
            let period = ctx.report_period()?;
            Ok(SinkInstance::Periodic {
                sink: Arc::new(CsvSink::new(ctx.name, directory)?),
                period,
            })
        });
        factory.register(Self::SERVLET, |ctx| {
            let path = ctx.property("path").unwrap_or(JsonHandler::DEFAULT_PATH);
            Ok(SinkInstance::Presentation(Arc::new(JsonHandler::new(
                path,
                Arc::clone(ctx.registry),
                Arc::clone(ctx.security),
            ))))
        });
        factory.register(Self::PROMETHEUS, |ctx| {
            let path = ctx.property("path").unwrap_or(PrometheusHandler::DEFAULT_PATH);
            Ok(SinkInstance::Presentation(Arc::new(PrometheusHandler::new(
                path,
                Arc::clone(ctx.registry),
                Arc::clone(ctx.security),
            ))))
        });
        factory
    }

    /// Registers (or replaces) the constructor for `class`.
    pub fn register<F>(&mut self, class: impl Into<String>, constructor: F)
    where
        F: Fn(&SinkContext<'_>) -> Result<SinkInstance, ConfigError> + Send + Sync + 'static,
    {
        self.constructors.insert(class.into(), Arc::new(constructor));
    }

    /// Instantiates the sink described by `ctx`.
    pub fn build(&self, ctx: &SinkContext<'_>) -> Result<SinkInstance, ConfigError> {
        let class = ctx.require("class")?;
        let constructor =
            self.constructors
                .get(class.trim())
                .ok_or_else(|| ConfigError::UnknownClass {
                    component: "sink",
                    name: ctx.name.to_string(),
                    class: class.to_string(),
                })?;
        constructor(ctx)
    }

    /// Known classes in ascending order.
    pub fn classes(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for SinkFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkFactory")
            .field("classes", &self.classes())
            .finish()
    }
}

/// Reads `period` and `unit` and enforces [`MINIMAL_PERIOD`].
pub fn parse_period(name: &str, properties: &PropertyMap) -> Result<Duration, ConfigError> {
    let invalid = |property: &'static str, value: &str| ConfigError::InvalidProperty {
        component: "sink",
        name: name.to_string(),
        property,
        value: value.to_string(),
    };

    let amount = match properties.get("period") {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| invalid("period", raw))?,
        None => DEFAULT_PERIOD,
    };

    let unit = properties.get("unit").map(|u| u.trim().to_ascii_lowercase());
    let period = match unit.as_deref().unwrap_or("seconds") {
        "ms" | "millisecond" | "milliseconds" => Duration::from_millis(amount),
        "s" | "second" | "seconds" => Duration::from_secs(amount),
        "minute" | "minutes" => Duration::from_secs(amount.saturating_mul(60)),
        "hour" | "hours" => Duration::from_secs(amount.saturating_mul(3_600)),
        "day" | "days" => Duration::from_secs(amount.saturating_mul(86_400)),
        other => return Err(invalid("unit", other)),
    };

    if period < MINIMAL_PERIOD {
        return Err(ConfigError::PeriodTooShort {
            name: name.to_string(),
            period,
            minimum: MINIMAL_PERIOD,
        });
    }
    Ok(period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::AllowAll;

    fn props(pairs: &[(&str, &str)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(factory: &SinkFactory, name: &str, properties: &PropertyMap) -> Result<SinkInstance, ConfigError> {
        let registry = Arc::new(LiveRegistry::new());
        let security: Arc<dyn SecurityContext> = Arc::new(AllowAll);
        factory.build(&SinkContext {
            name,
            properties,
            registry: &registry,
            security: &security,
        })
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(parse_period("s", &PropertyMap::new()).unwrap(), Duration::from_secs(10));
        assert_eq!(
            parse_period("s", &props(&[("period", "2"), ("unit", "MINUTES")])).unwrap(),
            Duration::from_secs(120)
        );
        assert_eq!(
            parse_period("s", &props(&[("period", "1500"), ("unit", "milliseconds")])).unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_period_errors() {
        assert!(matches!(
            parse_period("s", &props(&[("period", "ten")])),
            Err(ConfigError::InvalidProperty { property: "period", .. })
        ));
        assert!(matches!(
            parse_period("s", &props(&[("unit", "fortnights")])),
            Err(ConfigError::InvalidProperty { property: "unit", .. })
        ));
        assert!(matches!(
            parse_period("s", &props(&[("period", "500"), ("unit", "ms")])),
            Err(ConfigError::PeriodTooShort { .. })
        ));
    }

    #[test]
    fn test_builtin_classes() {
        let factory = SinkFactory::with_builtin();
        assert_eq!(
            factory.classes(),
            vec!["console", "csv", "log", "prometheus", "servlet"]
        );

        match build(&factory, "console", &props(&[("class", "console"), ("period", "3")])) {
            Ok(SinkInstance::Periodic { sink, period }) => {
                assert_eq!(sink.name(), "console");
                assert_eq!(period, Duration::from_secs(3));
            }
            _ => panic!("Expected a periodic console sink"),
        }

        match build(&factory, "servlet", &props(&[("class", "servlet")])) {
            Ok(SinkInstance::Presentation(handler)) => {
                assert_eq!(handler.path(), JsonHandler::DEFAULT_PATH);
            }
            _ => panic!("Expected a presentation handler"),
        }
    }

    #[test]
    fn test_build_errors() {
        let factory = SinkFactory::with_builtin();
        assert!(matches!(
            build(&factory, "nameless", &PropertyMap::new()),
            Err(ConfigError::MissingProperty { property: "class", .. })
        ));
        assert!(matches!(
            build(&factory, "g", &props(&[("class", "graphite")])),
            Err(ConfigError::UnknownClass { .. })
        ));
        assert!(matches!(
            build(&factory, "csv", &props(&[("class", "csv")])),
            Err(ConfigError::MissingProperty { property: "directory", .. })
        ));
    }
}
