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

//! Metric objects and their point-in-time values.

use serde::Serialize;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// The fundamental type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// A value that only ever increases (e.g., total tasks finished).
    Counter,
    /// A value that can go up or down (e.g., current heap usage).
    Gauge,
    /// A value that tracks the distribution of a set of measurements.
    Histogram,
}

/// A point-in-time reading of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricValue {
    /// A 64-bit unsigned integer for counters.
    Counter(u64),
    /// A 64-bit float for gauges.
    Gauge(f64),
    /// Summary of a distribution across predefined, cumulative buckets.
    Histogram {
        /// Number of recorded samples.
        count: u64,
        /// Sum of all recorded samples.
        sum: f64,
        /// Smallest recorded sample, `0.0` when empty.
        min: f64,
        /// Largest recorded sample, `0.0` when empty.
        max: f64,
        /// The upper bounds of the histogram buckets.
        bucket_bounds: Vec<f64>,
        /// The count of samples less than or equal to each bound.
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// Returns the [`MetricType`] corresponding to this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// Returns the value as an `f64` if it is a `Counter` or `Gauge`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Counter(v) => Some(*v as f64),
            MetricValue::Gauge(v) => Some(*v),
            MetricValue::Histogram { .. } => None,
        }
    }

    /// Returns the value as a `u64` if it is a `Counter`.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is a `Gauge`.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Counter(v) => write!(f, "{v}"),
            MetricValue::Gauge(v) => write!(f, "{v}"),
            MetricValue::Histogram {
                count,
                sum,
                min,
                max,
                ..
            } => {
                let mean = if *count == 0 { 0.0 } else { sum / *count as f64 };
                write!(f, "count={count} min={min} max={max} mean={mean}")
            }
        }
    }
}

/// An opaque, shareable metric object.
///
/// The metrics system never copies metrics: the same object owned by a
/// [`Source`](super::Source) is the one exposed by the central registry, so
/// updates are visible to every reader without further bookkeeping.
pub trait Metric: Send + Sync + Debug + 'static {
    /// The type of this metric.
    fn metric_type(&self) -> MetricType;

    /// Reads the current value.
    fn value(&self) -> MetricValue;
}

/// Shared handle to a metric object.
pub type MetricRef = Arc<dyn Metric>;

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by 1, returning the new value.
    pub fn inc(&self) -> u64 {
        self.inc_by(1)
    }

    /// Increments the counter by `amount`, saturating at `u64::MAX`.
    pub fn inc_by(&self, amount: u64) -> u64 {
        let mut current = self.value.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(amount);
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns the current count.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Metric for Counter {
    fn metric_type(&self) -> MetricType {
        MetricType::Counter
    }

    fn value(&self) -> MetricValue {
        MetricValue::Counter(self.get())
    }
}

/// A gauge holding the last value set.
#[derive(Debug, Default)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    /// Creates a gauge reading `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gauge to `value`.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Adds `delta` to the gauge, returning the new value.
    pub fn add(&self, delta: f64) -> f64 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = f64::from_bits(current) + delta;
            match self.bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Metric for Gauge {
    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
    }

    fn value(&self) -> MetricValue {
        MetricValue::Gauge(self.get())
    }
}

/// A gauge whose value is computed on every read.
pub struct CallbackGauge {
    read: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl CallbackGauge {
    /// Creates a gauge backed by `read`.
    pub fn new(read: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            read: Box::new(read),
        }
    }

    /// Evaluates the callback.
    pub fn get(&self) -> f64 {
        (self.read)()
    }
}

impl Debug for CallbackGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackGauge").finish_non_exhaustive()
    }
}

impl Metric for CallbackGauge {
    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
    }

    fn value(&self) -> MetricValue {
        MetricValue::Gauge(self.get())
    }
}

#[derive(Debug)]
struct HistogramState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    bucket_counts: Vec<u64>,
}

/// A histogram with fixed, cumulative buckets.
#[derive(Debug)]
pub struct Histogram {
    bucket_bounds: Vec<f64>,
    state: Mutex<HistogramState>,
}

impl Histogram {
    /// Creates a histogram with the given bucket upper bounds.
    ///
    /// Bounds are sorted ascending; NaN bounds are discarded.
    pub fn new(mut bucket_bounds: Vec<f64>) -> Self {
        bucket_bounds.retain(|b| !b.is_nan());
        bucket_bounds.sort_by(|a, b| a.total_cmp(b));
        let bucket_counts = vec![0; bucket_bounds.len()];
        Self {
            bucket_bounds,
            state: Mutex::new(HistogramState {
                count: 0,
                sum: 0.0,
                min: 0.0,
                max: 0.0,
                bucket_counts,
            }),
        }
    }

    /// Records a sample.
    pub fn observe(&self, sample: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.count == 0 {
            state.min = sample;
            state.max = sample;
        } else {
            state.min = state.min.min(sample);
            state.max = state.max.max(sample);
        }
        state.count += 1;
        state.sum += sample;

        // Cumulative buckets: each bucket counts all samples <= its bound
        for (i, &bound) in self.bucket_bounds.iter().enumerate() {
            if sample <= bound {
                state.bucket_counts[i] += 1;
            }
        }
    }

    /// Number of recorded samples.
    pub fn count(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }
}

impl Metric for Histogram {
    fn metric_type(&self) -> MetricType {
        MetricType::Histogram
    }

    fn value(&self) -> MetricValue {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        MetricValue::Histogram {
            count: state.count,
            sum: state.sum,
            min: state.min,
            max: state.max,
            bucket_bounds: self.bucket_bounds.clone(),
            bucket_counts: state.bucket_counts.clone(),
        }
    }
}

/// A specialized `Result` type for metric-related operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error that can occur while managing named metrics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    /// A metric with this name is already present.
    #[error("Metric already registered: {0}")]
    DuplicateName(String),
    /// The requested metric was not found.
    #[error("Metric not found: {0}")]
    NotFound(String),
    /// An error originating from a storage backend.
    #[error("Storage error: {0}")]
    StorageError(String),
}
