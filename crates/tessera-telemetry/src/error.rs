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

//! Errors raised while configuring and driving a metrics system.

use std::time::Duration;
use tessera_core::telemetry::{MetricsError, SinkError};

/// A configured sink or source could not be instantiated.
///
/// These never abort [`MetricsSystem::start`](crate::MetricsSystem::start):
/// the offending component is logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A mandatory property is absent.
    #[error("{component} '{name}' is missing mandatory property '{property}'")]
    MissingProperty {
        /// `"sink"` or `"source"`.
        component: &'static str,
        /// Configured name.
        name: String,
        /// Missing property.
        property: &'static str,
    },
    /// The `class` property names no known kind.
    #[error("{component} '{name}' references unknown class '{class}'")]
    UnknownClass {
        /// `"sink"` or `"source"`.
        component: &'static str,
        /// Configured name.
        name: String,
        /// Unrecognized class.
        class: String,
    },
    /// A property could not be interpreted.
    #[error("{component} '{name}' has invalid {property} '{value}'")]
    InvalidProperty {
        /// `"sink"` or `"source"`.
        component: &'static str,
        /// Configured name.
        name: String,
        /// Offending property.
        property: &'static str,
        /// Offending value.
        value: String,
    },
    /// The reporting period is shorter than the allowed minimum.
    #[error("sink '{name}' period {period:?} is below the minimum of {minimum:?}")]
    PeriodTooShort {
        /// Configured name.
        name: String,
        /// Requested period.
        period: Duration,
        /// Smallest accepted period.
        minimum: Duration,
    },
    /// The sink failed while setting up its destination.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// The source could not register its metrics.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// An error returned by the metrics system lifecycle API.
#[derive(Debug, thiserror::Error)]
pub enum MetricsSystemError {
    /// `start` was called on a running system.
    #[error("Attempting to start a metrics system that is already running")]
    AlreadyRunning,
    /// The operation requires a running system.
    #[error("The metrics system is not running")]
    NotRunning,
    /// A report thread could not be created.
    #[error("Failed to spawn the report cycle of sink '{name}': {source}")]
    Spawn {
        /// Sink name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// A sink failed to start.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Internal metrics could not be registered.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}
