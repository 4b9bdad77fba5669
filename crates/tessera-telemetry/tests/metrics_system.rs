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

//! End-to-end behaviour of the metrics system through its public API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_core::config::keys;
use tessera_core::telemetry::{
    Metric, MetricValue, RegistrySnapshot, SimpleSource, Sink, SinkError, Source,
};
use tessera_core::{AclSecurity, AllowAll, MetricsConfig};
use tessera_telemetry::{
    LiveRegistry, MetricsSystem, MetricsSystemBuilder, MetricsSystemError, Role, SinkInstance,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(pairs: &[(&str, &str)]) -> MetricsConfig {
    pairs.iter().copied().collect()
}

fn create(role: Role, config: MetricsConfig) -> MetricsSystem {
    init_logging();
    MetricsSystem::create(role, Arc::new(config), Arc::new(AllowAll), None).unwrap()
}

fn source(name: &str) -> Arc<SimpleSource> {
    Arc::new(SimpleSource::new(name))
}

#[derive(Debug, Default)]
struct CountingSink {
    reports: AtomicUsize,
    last_len: AtomicUsize,
}

impl Sink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }

    fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), SinkError> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        self.last_len.store(snapshot.len(), Ordering::SeqCst);
        Ok(())
    }
}

/// A sink that takes its time to start or to report.
#[derive(Debug)]
struct SlowSink {
    name: &'static str,
    start_delay: Duration,
    report_delay: Duration,
    reports: AtomicUsize,
}

impl SlowSink {
    fn new(name: &'static str, start_delay: Duration, report_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            start_delay,
            report_delay,
            reports: AtomicUsize::new(0),
        })
    }
}

impl Sink for SlowSink {
    fn name(&self) -> &str {
        self.name
    }

    fn start(&self) -> Result<(), SinkError> {
        thread::sleep(self.start_delay);
        Ok(())
    }

    fn report(&self, _snapshot: &RegistrySnapshot) -> Result<(), SinkError> {
        thread::sleep(self.report_delay);
        self.reports.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_registry_name_for_privileged_roles() {
    let source = SimpleSource::new("jvm");
    let base = [(keys::APPLICATION_ID, "A"), (keys::EXECUTOR_ID, "E")];

    for role in [Role::worker(), Role::coordinator()] {
        let system = create(role, config(&base));
        assert_eq!(system.build_registry_name(&source), "A.E.jvm");
    }
}

#[test]
fn test_registry_name_fallbacks() {
    let source = SimpleSource::new("jvm");

    let no_app = create(Role::worker(), config(&[(keys::EXECUTOR_ID, "E")]));
    assert_eq!(no_app.build_registry_name(&source), "jvm");

    let no_executor = create(Role::worker(), config(&[(keys::APPLICATION_ID, "A")]));
    assert_eq!(no_executor.build_registry_name(&source), "jvm");

    let namespace_without_executor = create(
        Role::coordinator(),
        config(&[
            (keys::APPLICATION_ID, "A"),
            (keys::METRICS_NAMESPACE, "ns"),
        ]),
    );
    assert_eq!(namespace_without_executor.build_registry_name(&source), "jvm");
}

#[test]
fn test_registry_name_with_namespace() {
    let source = SimpleSource::new("jvm");

    let expanded = create(
        Role::worker(),
        config(&[
            (keys::APPLICATION_ID, "A"),
            (keys::APPLICATION_NAME, "N"),
            (keys::EXECUTOR_ID, "E"),
            (keys::METRICS_NAMESPACE, "${application.name}"),
        ]),
    );
    assert_eq!(expanded.build_registry_name(&source), "N.E.jvm");

    let unresolved = create(
        Role::worker(),
        config(&[
            (keys::EXECUTOR_ID, "E"),
            (keys::METRICS_NAMESPACE, "${missing.key}"),
        ]),
    );
    assert_eq!(
        unresolved.build_registry_name(&source),
        "${missing.key}.E.jvm"
    );
}

#[test]
fn test_registry_name_ignores_config_for_other_roles() {
    let source = SimpleSource::new("jvm");
    let full = config(&[
        (keys::APPLICATION_ID, "A"),
        (keys::APPLICATION_NAME, "N"),
        (keys::EXECUTOR_ID, "E"),
        (keys::METRICS_NAMESPACE, "${application.name}"),
    ]);
    for role in ["history-role", "shuffle-role", "coordinator"] {
        let system = create(Role::new(role), full.clone());
        assert_eq!(system.build_registry_name(&source), "jvm");
    }
}

#[test]
fn test_register_source_grows_sources_by_one() {
    let system = create(Role::worker(), MetricsConfig::new());
    let before = system.sources().len();

    system.register_source(source("dag"));
    assert_eq!(system.sources().len(), before + 1);

    // Same name again: both registrations coexist
    system.register_source(source("dag"));
    assert_eq!(system.sources().len(), before + 2);
    assert_eq!(system.sources_by_name("dag").len(), 2);
}

#[test]
fn test_metric_added_after_registration_is_visible() {
    let system = create(
        Role::worker(),
        config(&[(keys::APPLICATION_ID, "A"), (keys::EXECUTOR_ID, "E")]),
    );
    let late = source("late");
    let prefix = system.register_source(late.clone());
    assert_eq!(prefix, "A.E.late");
    assert!(system.registry().names_with_prefix("A.E.late").is_empty());

    let counter = late.metrics().counter("m").unwrap();
    counter.inc_by(5);

    let projected = system.registry().get("A.E.late.m").unwrap();
    assert_eq!(projected.value(), MetricValue::Counter(5));

    // Same object, not a copy
    counter.inc();
    assert_eq!(projected.value(), MetricValue::Counter(6));

    late.metrics().remove("m").unwrap();
    assert!(!system.registry().contains("A.E.late.m"));
}

#[test]
fn test_remove_source_retracts_its_metrics() {
    let system = create(Role::new("standalone"), MetricsConfig::new());
    let first = source("shared");
    first.metrics().gauge("value").unwrap().set(1.0);
    let second = source("shared");
    second.metrics().gauge("value").unwrap().set(2.0);

    system.register_source(first.clone());
    system.register_source(second.clone());
    // The first registration keeps the clashing name
    assert_eq!(
        system.registry().snapshot().get("shared.value"),
        Some(&MetricValue::Gauge(1.0))
    );

    let second_dyn: Arc<dyn Source> = second;
    assert!(system.remove_source(&second_dyn));
    assert!(!system.remove_source(&second_dyn));
    assert!(system.registry().contains("shared.value"));

    let first_dyn: Arc<dyn Source> = first;
    assert!(system.remove_source(&first_dyn));
    assert!(!system.registry().contains("shared.value"));
}

#[test]
fn test_removing_first_clashing_source_exposes_the_second() {
    let system = create(Role::new("standalone"), MetricsConfig::new());
    let first = source("shared");
    first.metrics().gauge("value").unwrap().set(1.0);
    let second = source("shared");
    let survivor = second.metrics().gauge("value").unwrap();
    survivor.set(2.0);

    let first_dyn: Arc<dyn Source> = first;
    system.register_source(first_dyn.clone());
    system.register_source(second);
    assert!(system.remove_source(&first_dyn));

    let projected = system.registry().get("shared.value").unwrap();
    assert!(std::ptr::addr_eq(Arc::as_ptr(&projected), Arc::as_ptr(&survivor)));
    assert_eq!(projected.value(), MetricValue::Gauge(2.0));
}

#[test]
fn test_snapshots_see_whole_sources() {
    const SOURCES: usize = 40;
    const METRICS: usize = 50;

    let system = create(Role::new("standalone"), MetricsConfig::new());
    let prepared: Vec<_> = (0..SOURCES)
        .map(|i| {
            let bulk = source(&format!("bulk-{i}"));
            for m in 0..METRICS {
                bulk.metrics().counter(format!("m{m}")).unwrap();
            }
            bulk
        })
        .collect();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let watcher = scope.spawn(|| {
            let mut snapshots = 0;
            loop {
                let finished = done.load(Ordering::SeqCst);
                let snapshot = system.registry().snapshot();
                for i in 0..SOURCES {
                    let lead = format!("bulk-{i}.");
                    let seen = snapshot.iter().filter(|(name, _)| name.starts_with(&lead)).count();
                    assert!(
                        seen == 0 || seen == METRICS,
                        "bulk-{i} observed with {seen} of {METRICS} metrics"
                    );
                }
                snapshots += 1;
                if finished {
                    return snapshots;
                }
            }
        });

        for bulk in &prepared {
            system.register_source(bulk.clone());
        }
        done.store(true, Ordering::SeqCst);
        assert!(watcher.join().unwrap() >= 1);
    });

    assert_eq!(system.registry().names_with_prefix("bulk-0").len(), METRICS);
}

#[test]
fn test_slow_sink_start_does_not_block_source_registration() {
    let system = create(Role::worker(), MetricsConfig::new());
    system.start().unwrap();
    let slow = SlowSink::new("slow-start", Duration::from_secs(2), Duration::ZERO);

    thread::scope(|scope| {
        let registering =
            scope.spawn(|| system.register_sink(slow.clone(), Duration::from_secs(3_600)));
        thread::sleep(Duration::from_millis(200));

        let begun = Instant::now();
        system.register_source(source("quick"));
        let waited = begun.elapsed();
        assert!(waited < Duration::from_millis(500), "register_source waited {waited:?}");

        registering.join().unwrap().unwrap();
    });

    assert_eq!(system.active_report_cycles(), 1);
    system.stop();
}

#[test]
fn test_slow_sink_does_not_delay_others() {
    let system = create(Role::worker(), MetricsConfig::new());
    let slow = SlowSink::new("slow-report", Duration::ZERO, Duration::from_millis(1_500));
    let fast = Arc::new(CountingSink::default());
    system.register_sink(slow.clone(), Duration::from_millis(100)).unwrap();
    system.register_sink(fast.clone(), Duration::from_millis(100)).unwrap();

    system.start().unwrap();
    thread::sleep(Duration::from_millis(1_000));
    let fast_reports = fast.reports.load(Ordering::SeqCst);
    let slow_reports = slow.reports.load(Ordering::SeqCst);
    system.stop();

    assert!(fast_reports >= 5, "fast sink reported {fast_reports} times");
    // Still inside its first report
    assert_eq!(slow_reports, 0);
    assert_eq!(slow.reports.load(Ordering::SeqCst), 1);
}

#[test]
fn test_start_then_stop_leaves_no_report_cycle() {
    let system = create(
        Role::worker(),
        config(&[
            ("*.sink.console.class", "console"),
            ("*.sink.console.period", "1"),
            ("worker-role.sink.log.class", "log"),
        ]),
    );
    assert_eq!(system.active_report_cycles(), 0);

    system.start().unwrap();
    assert_eq!(system.sinks().len(), 2);
    assert_eq!(system.active_report_cycles(), 2);

    system.stop();
    assert_eq!(system.active_report_cycles(), 0);
    assert!(!system.is_running());
}

#[test]
fn test_broken_sink_does_not_prevent_others() {
    let system = create(
        Role::coordinator(),
        config(&[
            ("*.sink.bad.class", "com.example.Missing"),
            ("*.sink.nodir.class", "csv"),
            ("*.sink.fast.class", "log"),
            ("*.sink.fast.period", "100"),
            ("*.sink.fast.unit", "milliseconds"),
            ("coordinator-role.sink.good.class", "log"),
        ]),
    );
    system.start().unwrap();

    let names: Vec<_> = system.sinks().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(names, vec!["good"]);
    assert_eq!(system.active_report_cycles(), 1);
}

#[test]
fn test_custom_sink_kind_reports_periodically() {
    init_logging();
    let sink = Arc::new(CountingSink::default());
    let shared = Arc::clone(&sink);

    let config = config(&[
        ("*.sink.counting.class", "counting"),
        ("*.sink.counting.period", "1"),
    ]);
    let system = MetricsSystemBuilder::new(Role::worker(), Arc::new(config), Arc::new(AllowAll))
        .sink_kind("counting", move |ctx| {
            Ok(SinkInstance::Periodic {
                sink: Arc::clone(&shared) as Arc<dyn Sink>,
                period: ctx.report_period()?,
            })
        })
        .build()
        .unwrap();

    system.start().unwrap();
    thread::sleep(Duration::from_millis(1_300));
    system.stop();

    let reports = sink.reports.load(Ordering::SeqCst);
    assert!(reports >= 1, "expected a periodic report, got {reports}");
    thread::sleep(Duration::from_millis(1_100));
    assert_eq!(sink.reports.load(Ordering::SeqCst), reports);
}

#[test]
fn test_register_sink_while_running_and_flush() {
    let system = create(Role::worker(), MetricsConfig::new());
    system.start().unwrap();

    let sink = Arc::new(CountingSink::default());
    system
        .register_sink(sink.clone(), Duration::from_secs(3_600))
        .unwrap();
    assert_eq!(system.active_report_cycles(), 1);

    assert_eq!(system.report(), 1);
    assert_eq!(sink.reports.load(Ordering::SeqCst), 1);
    // The static source is always reported
    assert!(sink.last_len.load(Ordering::SeqCst) > 0);
    system.stop();
}

#[test]
fn test_double_start_is_an_error() {
    let system = create(Role::worker(), MetricsConfig::new());
    system.start().unwrap();
    assert!(matches!(
        system.start(),
        Err(MetricsSystemError::AlreadyRunning)
    ));
}

#[test]
fn test_external_registry_receives_projections() {
    init_logging();
    let registry = Arc::new(LiveRegistry::new());
    let system = MetricsSystem::create(
        Role::new("standalone"),
        Arc::new(MetricsConfig::new()),
        Arc::new(AllowAll),
        Some(Arc::clone(&registry)),
    )
    .unwrap();

    let jobs = source("jobs");
    jobs.metrics().counter("submitted").unwrap();
    system.register_source(jobs);

    assert!(Arc::ptr_eq(system.registry(), &registry));
    assert!(registry.contains("jobs.submitted"));
    assert!(registry.contains("metrics-system.sources.registered"));
}

#[test]
fn test_presentation_handlers() {
    let idle = create(Role::worker(), MetricsConfig::new());
    assert!(matches!(
        idle.presentation_handlers(),
        Err(MetricsSystemError::NotRunning)
    ));
    idle.start().unwrap();
    assert!(idle.presentation_handlers().unwrap().is_empty());

    let exposed = create(
        Role::worker(),
        config(&[
            ("*.sink.servlet.class", "servlet"),
            ("*.sink.prom.class", "prometheus"),
            ("*.sink.prom.path", "/custom/prom"),
        ]),
    );
    let counter = source("jobs");
    counter.metrics().counter("done").unwrap().inc_by(2);
    exposed.register_source(counter);
    exposed.start().unwrap();

    let handlers = exposed.presentation_handlers().unwrap();
    let paths: Vec<_> = handlers.iter().map(|h| h.path().to_string()).collect();
    assert_eq!(paths, vec!["/custom/prom", "/metrics/json"]);
    assert!(handlers[0].render(None).unwrap().contains("jobs_done 2"));
    assert!(handlers[1].render(None).unwrap().contains("\"jobs.done\": 2"));
}

#[test]
fn test_presentation_respects_security() {
    init_logging();
    let config = config(&[("*.sink.servlet.class", "servlet")]);
    let system = MetricsSystem::create(
        Role::worker(),
        Arc::new(config),
        Arc::new(AclSecurity::new(["ops"])),
        None,
    )
    .unwrap();
    system.start().unwrap();

    let handler = &system.presentation_handlers().unwrap()[0];
    assert!(handler.render(Some("ops")).is_ok());
    assert!(handler.render(Some("intruder")).is_err());
}

#[test]
fn test_configured_process_source() {
    let system = create(
        Role::worker(),
        config(&[
            (keys::APPLICATION_ID, "A"),
            (keys::EXECUTOR_ID, "3"),
            ("*.source.process.class", "process"),
        ]),
    );
    system.start().unwrap();

    assert_eq!(system.sources_by_name("process").len(), 1);
    assert!(system
        .registry()
        .contains("A.3.process.memory.resident_bytes"));
    system.stop();
}
