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

//! # Tessera Telemetry
//!
//! The per-process metrics system. Every process role runs one
//! [`MetricsSystem`]: it names registered sources after the role and
//! application, projects their metrics live into a central
//! [`LiveRegistry`], and reports that registry to the configured sinks on
//! independent timers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_core::{AllowAll, MetricsConfig};
//! use tessera_telemetry::{MetricsSystem, Role};
//!
//! let config: MetricsConfig = [
//!     ("application.id", "app-20250101"),
//!     ("executor.id", "1"),
//!     ("*.sink.console.class", "console"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let system = MetricsSystem::create(Role::worker(), Arc::new(config), Arc::new(AllowAll), None)?;
//! system.start()?;
//! system.stop();
//! # Ok::<(), tessera_telemetry::MetricsSystemError>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod metrics;
pub mod naming;
pub mod presentation;
pub mod properties;
pub mod role;
pub mod service;
pub mod sinks;
pub mod sources;
pub mod storage;
pub mod utils;

pub use error::{ConfigError, MetricsSystemError};
pub use metrics::registry::LiveRegistry;
pub use naming::{build_registry_name, NamingResolver};
pub use presentation::{PresentationError, PresentationHandler};
pub use role::Role;
pub use service::{MetricsSystem, MetricsSystemBuilder};
pub use sinks::factory::{SinkContext, SinkInstance};
pub use sources::process::ProcessSource;
