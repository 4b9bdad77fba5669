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

//! Periodic sinks and the machinery driving them.

pub mod console;
pub mod csv;
pub mod factory;
pub mod log;
pub mod manager;
pub mod schedule;

pub use console::ConsoleSink;
pub use csv::CsvSink;
pub use factory::{SinkContext, SinkFactory, SinkInstance};
pub use self::log::LogSink;
pub use manager::SinkManager;
pub use schedule::{ReportCycle, ReportStats};
