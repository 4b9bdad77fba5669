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

//! Scope timers feeding histograms.

use std::time::Instant;
use tessera_core::telemetry::Histogram;

/// Measures the lifetime of a guard and adds it, in milliseconds, to a
/// [`Histogram`] on drop.
/// Early returns are timed too.
pub struct ScopedMetricTimer<'a> {
    started: Instant,
    histogram: &'a Histogram,
}

impl<'a> ScopedMetricTimer<'a> {
    /// Starts timing now.
    pub fn new(histogram: &'a Histogram) -> Self {
        Self {
            started: Instant::now(),
            histogram,
        }
    }
}

impl Drop for ScopedMetricTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.histogram.observe(elapsed_ms);
    }
}
