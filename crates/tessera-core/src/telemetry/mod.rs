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

//! Provides the foundational traits and data structures for metric collection.
//!
//! This module defines the "common language" between the subsystems that own
//! metrics and the metrics system that aggregates them. A [`Source`] is a named
//! bundle of metrics, a [`Sink`] periodically consumes a [`RegistrySnapshot`],
//! and a metric itself is an opaque value container shared by reference.

pub mod metrics;
pub mod sink;
pub mod source;

pub use self::metrics::{
    CallbackGauge, Counter, Gauge, Histogram, Metric, MetricRef, MetricType, MetricValue,
    MetricsError, MetricsResult,
};
pub use self::sink::{RegistrySnapshot, Sink, SinkError};
pub use self::source::{MetricSet, MetricSetListener, SimpleSource, Source, SubscriptionId};
