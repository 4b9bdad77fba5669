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

//! A sink forwarding reports to the `log` facade.

use log::Level;
use tessera_core::telemetry::{RegistrySnapshot, Sink, SinkError};

/// Emits one `info` record per metric under a configurable target.
#[derive(Debug)]
pub struct LogSink {
    name: String,
    target: String,
}

impl LogSink {
    /// Target used when none is configured.
    pub const DEFAULT_TARGET: &'static str = "tessera::metrics";

    /// Creates a sink logging under `target`.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    /// The log target of emitted records.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Sink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), SinkError> {
        if !log::log_enabled!(target: self.target.as_str(), Level::Info) {
            return Ok(());
        }
        for (name, value) in snapshot.iter() {
            log::log!(target: self.target.as_str(), Level::Info, "{name} = {value}");
        }
        Ok(())
    }
}
