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

//! A sink printing plain-text reports.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tessera_core::telemetry::{RegistrySnapshot, Sink, SinkError};

/// Writes every snapshot as `name = value` lines, standard output by default.
pub struct ConsoleSink {
    name: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// A sink writing to standard output.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_writer(name, io::stdout())
    }

    /// A sink writing to an arbitrary destination.
    pub fn with_writer(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), SinkError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(
            writer,
            "-- metrics @ {timestamp} ({} entries) --",
            snapshot.len()
        )?;
        for (name, value) in snapshot.iter() {
            writeln!(writer, "{name} = {value}")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}
