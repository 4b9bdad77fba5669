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

//! Runs a worker-role metrics system for a few seconds and prints its
//! registry to the console.

use anyhow::Result;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tessera_core::config::keys;
use tessera_core::telemetry::{SimpleSource, Source};
use tessera_core::{AllowAll, MetricsConfig};
use tessera_telemetry::{MetricsSystem, Role};

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config: MetricsConfig = [
        (keys::APPLICATION_ID, "app-sandbox"),
        (keys::APPLICATION_NAME, "sandbox"),
        (keys::EXECUTOR_ID, "1"),
        (keys::METRICS_NAMESPACE, "${application.name}"),
        ("*.sink.console.class", "console"),
        ("*.sink.console.period", "1"),
        ("*.sink.json.class", "servlet"),
        ("worker-role.source.process.class", "process"),
    ]
    .into_iter()
    .collect();

    let system = MetricsSystem::create(Role::worker(), Arc::new(config), Arc::new(AllowAll), None)?;

    let tasks = Arc::new(SimpleSource::new("tasks"));
    let finished = tasks.metrics().counter("finished")?;
    system.register_source(tasks.clone());
    system.start()?;

    // Registered after the source: still forwarded
    let in_flight = tasks.metrics().gauge("in_flight")?;

    for round in 0..3u32 {
        in_flight.set(f64::from(round + 1));
        finished.inc_by(u64::from(round) * 10);
        thread::sleep(Duration::from_millis(1_200));
    }

    for handler in system.presentation_handlers()? {
        log::info!("{} ->\n{}", handler.path(), handler.render(None)?);
    }

    system.report();
    system.stop();
    Ok(())
}
