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

//! A sink appending each metric to its own CSV file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tessera_core::telemetry::{MetricValue, RegistrySnapshot, Sink, SinkError};

const SCALAR_HEADER: &str = "t,value";
const HISTOGRAM_HEADER: &str = "t,count,sum,min,max,mean";

/// Appends one row per report to `<directory>/<metric>.csv`.
#[derive(Debug)]
pub struct CsvSink {
    name: String,
    directory: PathBuf,
}

impl CsvSink {
    /// Creates the sink, creating `directory` if needed.
    pub fn new(name: impl Into<String>, directory: impl AsRef<Path>) -> Result<Self, SinkError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            name: name.into(),
            directory,
        })
    }

    /// Directory receiving the files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding `metric`.
    pub fn file_for(&self, metric: &str) -> PathBuf {
        self.directory.join(format!("{}.csv", file_stem(metric)))
    }

    fn append(&self, metric: &str, timestamp: u64, value: &MetricValue) -> Result<(), SinkError> {
        let path = self.file_for(metric);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (header, row) = match value {
            MetricValue::Counter(v) => (SCALAR_HEADER, format!("{timestamp},{v}")),
            MetricValue::Gauge(v) => (SCALAR_HEADER, format!("{timestamp},{v}")),
            MetricValue::Histogram {
                count,
                sum,
                min,
                max,
                ..
            } => {
                let mean = if *count == 0 { 0.0 } else { sum / *count as f64 };
                (
                    HISTOGRAM_HEADER,
                    format!("{timestamp},{count},{sum},{min},{max},{mean}"),
                )
            }
        };

        if file.metadata()?.len() == 0 {
            writeln!(file, "{header}")?;
        }
        writeln!(file, "{row}")?;
        Ok(())
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), SinkError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        // Keep writing the other files when one fails, report the first error
        let mut first_error = None;
        for (metric, value) in snapshot.iter() {
            if let Err(e) = self.append(metric, timestamp, value) {
                log::warn!("CSV sink {} could not write {}: {}", self.name, metric, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Maps a metric name to a portable file stem.
fn file_stem(metric: &str) -> String {
    metric
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
