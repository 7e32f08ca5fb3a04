use crate::config::{DiskConfig, MetricRule, ProcessConfig, TenantConfig, TenantOverride, UsageRule};
use crate::monitor::process::ProcessMonitor;
use crate::monitor::system::SystemMonitor;
use crate::monitor::tenant::{TenantMonitor, PROCESS_MISSING_METRIC, RECORD_MISSING_METRIC};
use crate::monitor::Alerter;
use crate::state::{AppState, Registries};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use nodewatch_alert::registry::{EntityKey, EntityKind};
use nodewatch_alert::ThresholdPolicy;
use nodewatch_collector::kinds::{DiskIoMetricKind, ProcessMetricKind, SystemMetricKind};
use nodewatch_collector::{DiskIoCounters, DiskSample, ProcessTable, SystemSnapshot, SystemStatsSource};
use nodewatch_common::types::{EntityType, LiveProcess, SupervisorRecord, TenantIdentity};
use nodewatch_notify::notifier::Notifier;
use nodewatch_tenant::{SupervisorSource, TenantDirectory};
use std::sync::{Arc, Mutex};

type Shared<T> = Arc<Mutex<Option<T>>>;

fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(Some(value)))
}

fn set<T>(slot: &Shared<T>, value: Option<T>) {
    *slot.lock().unwrap() = value;
}

struct FakeStats(Shared<SystemSnapshot>);

impl SystemStatsSource for FakeStats {
    fn sample(&mut self) -> anyhow::Result<SystemSnapshot> {
        self.0
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("stats unavailable"))
    }
}

struct FakeTable(Shared<Vec<LiveProcess>>);

impl ProcessTable for FakeTable {
    fn snapshot(&mut self, filter: &dyn Fn(&str) -> bool) -> anyhow::Result<Vec<LiveProcess>> {
        let all = self
            .0
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("process table unavailable"))?;
        Ok(all.into_iter().filter(|p| filter(p.name.as_str())).collect())
    }
}

struct FakeDirectory(Shared<Vec<TenantIdentity>>);

#[async_trait]
impl TenantDirectory for FakeDirectory {
    async fn fetch_tenants(&self, _node_id: &str) -> anyhow::Result<Vec<TenantIdentity>> {
        self.0
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("directory unreachable"))
    }
}

struct FakeSupervisor(Shared<Vec<SupervisorRecord>>);

#[async_trait]
impl SupervisorSource for FakeSupervisor {
    async fn fetch_records(&self) -> anyhow::Result<Vec<SupervisorRecord>> {
        self.0
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("records dir missing"))
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn secs(n: i64) -> ChronoDuration {
    ChronoDuration::seconds(n)
}

fn alerter() -> Alerter {
    Alerter::new("nc-1", Notifier::new(Vec::new()))
}

fn snapshot(cpu: f64) -> SystemSnapshot {
    SystemSnapshot {
        cpu_usage: cpu,
        memory_usage: 40.0,
        load1: 0.5,
        load5: 0.5,
        load15: 0.5,
        disks: Vec::new(),
    }
}

fn disk(mount: &str, usage: f64, io: Option<DiskIoCounters>) -> DiskSample {
    DiskSample {
        mount: mount.to_string(),
        device: "vdb1".to_string(),
        usage_percent: usage,
        io,
    }
}

fn live(pid: u32, name: &str, cpu: f64, conns: u64) -> LiveProcess {
    LiveProcess {
        process_id: pid,
        name: name.to_string(),
        cpu_percent: cpu,
        memory_percent: 1.0,
        connection_count: conns,
    }
}

fn cooldown<K>(metric: K, threshold: f64, secs: u64) -> MetricRule<K> {
    let mut rule = MetricRule::new(metric, threshold, secs);
    rule.policy = Some(ThresholdPolicy::ImmediateWithCooldown);
    rule
}

// ---- system ----

#[tokio::test]
async fn test_cpu_sustained_fires_only_after_full_window() {
    let stats = shared(snapshot(95.0));
    let registries = Arc::new(Registries::default());
    let mut monitor = SystemMonitor::new(
        Box::new(FakeStats(stats.clone())),
        vec![MetricRule::new(SystemMetricKind::CpuUsage, 90.0, 60)],
        Vec::new(),
        registries.clone(),
        alerter(),
    );

    assert!(monitor.run_once_at(t0()).is_empty());
    set(&stats, Some(snapshot(96.0)));
    assert!(monitor.run_once_at(t0() + secs(30)).is_empty());
    set(&stats, Some(snapshot(97.0)));
    let fired = monitor.run_once_at(t0() + secs(61));

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].entity_type, EntityType::System);
    assert_eq!(fired[0].metric_name, "cpu_usage");
    assert_eq!(fired[0].metric_value, 97.0);
    assert_eq!(fired[0].threshold, 90.0);
    assert_eq!(fired[0].timestamp, t0() + secs(61));
    assert_eq!(fired[0].node_id, "nc-1");
}

#[tokio::test]
async fn test_disk_usage_cooldown_and_unconfigured_mount() {
    let mut snap = snapshot(10.0);
    snap.disks = vec![disk("/data1", 95.0, None), disk("/scratch", 99.0, None)];
    let stats = shared(snap);
    let registries = Arc::new(Registries::default());
    let disks = vec![DiskConfig {
        mount: "/data1".to_string(),
        usage: UsageRule {
            policy: None,
            threshold: 50.0,
            duration_secs: 300,
        },
        io: Vec::new(),
    }];
    let mut monitor = SystemMonitor::new(
        Box::new(FakeStats(stats)),
        Vec::new(),
        disks,
        registries.clone(),
        alerter(),
    );

    let fired = monitor.run_once_at(t0());
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].entity_type, EntityType::System);
    assert_eq!(fired[0].metric_name, "disk_usage:/data1");
    assert!(fired[0].message.starts_with("disk /data1:"));

    assert!(monitor.run_once_at(t0() + secs(10)).is_empty());
    assert!(monitor.run_once_at(t0() + secs(300)).is_empty());
    assert_eq!(monitor.run_once_at(t0() + secs(301)).len(), 1);

    let entities = registries.gauges.entities(EntityKind::Disk);
    assert_eq!(entities, vec![EntityKey::Disk("/data1".to_string())]);
}

#[tokio::test]
async fn test_disk_io_counters_use_integer_metrics() {
    let mut snap = snapshot(10.0);
    snap.disks = vec![disk(
        "/",
        10.0,
        Some(DiskIoCounters {
            read_bytes: 1,
            write_bytes: 1,
            read_count: 10,
            write_count: 5_000,
        }),
    )];
    let registries = Arc::new(Registries::default());
    let mut monitor = SystemMonitor::new(
        Box::new(FakeStats(shared(snap))),
        Vec::new(),
        vec![DiskConfig {
            mount: "/".to_string(),
            usage: UsageRule {
                policy: None,
                threshold: 50.0,
                duration_secs: 300,
            },
            io: vec![
                MetricRule::new(DiskIoMetricKind::WriteCount, 1_000, 300),
                MetricRule::new(DiskIoMetricKind::ReadCount, 1_000, 300),
            ],
        }],
        registries.clone(),
        alerter(),
    );

    let fired = monitor.run_once_at(t0());
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].metric_name, "write_count:/");
    assert_eq!(fired[0].metric_value, 5_000.0);

    let handle = registries
        .counters
        .get(&EntityKey::Disk("/".to_string()), "read_count")
        .unwrap();
    assert_eq!(handle.with_metric(|m| m.current_value()), 10);
}

#[tokio::test]
async fn test_stat_source_failure_skips_cycle() {
    let stats = shared(snapshot(99.0));
    set(&stats, None);
    let registries = Arc::new(Registries::default());
    let mut monitor = SystemMonitor::new(
        Box::new(FakeStats(stats.clone())),
        vec![cooldown(SystemMetricKind::CpuUsage, 90.0, 60)],
        Vec::new(),
        registries.clone(),
        alerter(),
    );

    assert!(monitor.run_once_at(t0()).is_empty());
    assert!(registries.is_empty());

    set(&stats, Some(snapshot(99.0)));
    assert_eq!(monitor.run_once_at(t0() + secs(15)).len(), 1);
}

// ---- process ----

#[tokio::test]
async fn test_process_monitor_observes_busiest_instance() {
    let table = shared(vec![
        live(10, "nginx", 50.0, 3),
        live(11, "nginx", 95.0, 40),
        live(12, "postgres", 99.0, 1),
    ]);
    let registries = Arc::new(Registries::default());
    let mut monitor = ProcessMonitor::new(
        Box::new(FakeTable(table)),
        vec![
            ProcessConfig {
                name: "nginx".to_string(),
                metrics: vec![
                    cooldown(ProcessMetricKind::CpuUsage, 90.0, 60),
                    cooldown(ProcessMetricKind::ConnCount, 15.0, 60),
                ],
            },
            ProcessConfig {
                name: "redis*".to_string(),
                metrics: vec![cooldown(ProcessMetricKind::CpuUsage, 1.0, 60)],
            },
        ],
        registries.clone(),
        alerter(),
    );

    let fired = monitor.run_once_at(t0());
    assert_eq!(fired.len(), 2);
    for event in &fired {
        assert_eq!(event.entity_type, EntityType::Process);
        assert_eq!(event.process_id, Some(11));
        assert_eq!(event.process_name.as_deref(), Some("nginx"));
    }
    let conn = fired.iter().find(|e| e.metric_name == "conn_count").unwrap();
    assert_eq!(conn.metric_value, 40.0);
    assert_eq!(conn.threshold, 15.0);

    // redis is not running: nothing registered for it
    let entities = registries.gauges.entities(EntityKind::Process);
    assert_eq!(entities, vec![EntityKey::Process("nginx".to_string())]);
}

// ---- tenant ----

struct TenantHarness {
    directory: Shared<Vec<TenantIdentity>>,
    supervisor: Shared<Vec<SupervisorRecord>>,
    table: Shared<Vec<LiveProcess>>,
    state: AppState,
    monitor: TenantMonitor,
}

fn tenant_harness(config: TenantConfig) -> TenantHarness {
    let directory = shared(vec![TenantIdentity::with_dns("a"), TenantIdentity::with_dns("b")]);
    let supervisor = shared(vec![SupervisorRecord::new("a", 100)]);
    let table = shared(vec![live(100, "minio", 99.0, 2), live(555, "nginx", 99.0, 2)]);
    let state = AppState::new("nc-1");
    let monitor = TenantMonitor::new(
        Box::new(FakeDirectory(directory.clone())),
        Box::new(FakeSupervisor(supervisor.clone())),
        Box::new(FakeTable(table.clone())),
        config,
        state.clone(),
        alerter(),
    );
    TenantHarness {
        directory,
        supervisor,
        table,
        state,
        monitor,
    }
}

fn tenant_config() -> TenantConfig {
    TenantConfig {
        metrics: vec![
            cooldown(ProcessMetricKind::CpuUsage, 90.0, 60),
            cooldown(ProcessMetricKind::ConnCount, 15.0, 60),
        ],
        ..TenantConfig::default()
    }
}

#[tokio::test]
async fn test_tenant_cycle_reconciles_and_alerts() {
    let mut h = tenant_harness(tenant_config());
    let fired = h.monitor.run_once_at(t0()).await;

    let cpu = fired.iter().find(|e| e.metric_name == "cpu_usage").unwrap();
    assert_eq!(cpu.entity_type, EntityType::Tenant);
    assert_eq!(cpu.tenant_dns.as_deref(), Some("a"));
    assert_eq!(cpu.process_id, Some(100));

    let missing = fired
        .iter()
        .find(|e| e.metric_name == RECORD_MISSING_METRIC)
        .unwrap();
    assert_eq!(missing.tenant_dns.as_deref(), Some("b"));
    assert!(missing.process_id.is_none());
    assert_eq!(fired.len(), 2);

    let report = h.state.reconciliation().unwrap();
    assert!(!report.directory_stale);
    assert_eq!(report.summary.directory_tenants, 2);
    assert_eq!(report.summary.matched[0].dns, "a");
    assert_eq!(report.summary.matched[0].process_id, 100);
    assert_eq!(report.summary.tenants_without_supervisor_record, vec!["b".to_string()]);
    assert!(report.summary.supervisor_records_without_process.is_empty());

    let latency = h
        .state
        .registries
        .latencies
        .get(&EntityKey::System, "directory_fetch_latency");
    assert!(latency.is_some());
}

#[tokio::test]
async fn test_mismatch_alerts_respect_cooldown() {
    let mut config = tenant_config();
    config.mismatch_cooldown_secs = 300;
    let mut h = tenant_harness(config);
    set(&h.supervisor, Some(vec![SupervisorRecord::new("a", 100), SupervisorRecord::new("b", 200)]));

    let first = h.monitor.run_once_at(t0()).await;
    let crashed: Vec<_> = first
        .iter()
        .filter(|e| e.metric_name == PROCESS_MISSING_METRIC)
        .collect();
    assert_eq!(crashed.len(), 1);
    assert_eq!(crashed[0].tenant_dns.as_deref(), Some("b"));
    assert_eq!(crashed[0].process_id, Some(200));
    assert_eq!(crashed[0].process_name.as_deref(), Some("minio"));

    let again = h.monitor.run_once_at(t0() + secs(30)).await;
    assert!(again.iter().all(|e| e.metric_name != PROCESS_MISSING_METRIC));

    let later = h.monitor.run_once_at(t0() + secs(301)).await;
    assert_eq!(
        later
            .iter()
            .filter(|e| e.metric_name == PROCESS_MISSING_METRIC)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_recovered_tenant_clears_mismatch_flag() {
    let mut h = tenant_harness(tenant_config());
    h.monitor.run_once_at(t0()).await;

    set(&h.supervisor, Some(vec![SupervisorRecord::new("a", 100), SupervisorRecord::new("b", 101)]));
    set(
        &h.table,
        Some(vec![live(100, "minio", 1.0, 1), live(101, "minio", 1.0, 1)]),
    );
    h.monitor.run_once_at(t0() + secs(30)).await;

    let flag = h
        .state
        .registries
        .counters
        .get(&EntityKey::Tenant("b".to_string()), RECORD_MISSING_METRIC)
        .unwrap();
    assert_eq!(flag.with_metric(|m| m.current_value()), 0);
    assert_eq!(h.state.reconciliation().unwrap().summary.matched.len(), 2);
}

#[tokio::test]
async fn test_directory_failure_uses_last_known_tenants() {
    let mut h = tenant_harness(tenant_config());
    h.monitor.run_once_at(t0()).await;

    set(&h.directory, None);
    h.monitor.run_once_at(t0() + secs(30)).await;

    let report = h.state.reconciliation().unwrap();
    assert!(report.directory_stale);
    assert!(!report.supervisor_stale);
    assert_eq!(report.summary.directory_tenants, 2);
    assert_eq!(report.summary.matched.len(), 1);
}

#[tokio::test]
async fn test_directory_down_from_start_reconciles_empty_list() {
    let mut h = tenant_harness(tenant_config());
    set(&h.directory, None);
    set(&h.supervisor, None);

    let fired = h.monitor.run_once_at(t0()).await;
    assert!(fired.is_empty());

    let report = h.state.reconciliation().unwrap();
    assert!(report.directory_stale);
    assert!(report.supervisor_stale);
    assert_eq!(report.summary.directory_tenants, 0);
}

#[tokio::test]
async fn test_process_table_failure_skips_tenant_evaluation() {
    let mut h = tenant_harness(tenant_config());
    set(&h.table, None);

    let fired = h.monitor.run_once_at(t0()).await;
    assert!(fired.is_empty());
    assert!(h.state.reconciliation().is_none());
    assert!(h.state.registries.counters.list(EntityKind::Tenant).is_empty());
}

#[tokio::test]
async fn test_per_tenant_override_changes_threshold() {
    let mut config = tenant_config();
    config.overrides = vec![TenantOverride {
        dns: "a".to_string(),
        metrics: vec![cooldown(ProcessMetricKind::CpuUsage, 99.5, 60)],
    }];
    let mut h = tenant_harness(config);

    let fired = h.monitor.run_once_at(t0()).await;
    assert!(fired.iter().all(|e| e.metric_name != "cpu_usage"));
}

#[tokio::test]
async fn test_stale_tenant_entries_are_purged() {
    let mut config = tenant_config();
    config.stale_entity_ttl_secs = Some(60);
    let mut h = tenant_harness(config);
    h.monitor.run_once_at(t0()).await;
    let a = EntityKey::Tenant("a".to_string());
    assert!(h.state.registries.gauges.get(&a, "cpu_usage").is_some());

    set(&h.directory, Some(vec![TenantIdentity::with_dns("b")]));
    h.monitor.run_once_at(t0() + secs(30)).await;
    assert!(h.state.registries.gauges.get(&a, "cpu_usage").is_some());

    h.monitor.run_once_at(t0() + secs(120)).await;
    assert!(h.state.registries.gauges.get(&a, "cpu_usage").is_none());
    assert!(h
        .state
        .registries
        .counters
        .get(&EntityKey::Tenant("b".to_string()), RECORD_MISSING_METRIC)
        .is_some());
}

#[tokio::test]
async fn test_tenant_outage_restarts_sustained_window() {
    let config = TenantConfig {
        metrics: vec![MetricRule::new(ProcessMetricKind::CpuUsage, 90.0, 60)],
        ..TenantConfig::default()
    };
    let mut h = tenant_harness(config);
    h.monitor.run_once_at(t0()).await;
    let a = EntityKey::Tenant("a".to_string());
    let cpu = h.state.registries.gauges.get(&a, "cpu_usage").unwrap();
    assert_eq!(cpu.with_metric(|m| m.breach_started_at()), Some(t0()));

    // process gone for two cycles
    set(&h.table, Some(Vec::new()));
    h.monitor.run_once_at(t0() + secs(30)).await;
    h.monitor.run_once_at(t0() + secs(600)).await;
    assert_eq!(cpu.with_metric(|m| m.breach_started_at()), None);

    // restarted under a new pid, still hot
    set(&h.supervisor, Some(vec![SupervisorRecord::new("a", 4242)]));
    set(&h.table, Some(vec![live(4242, "minio", 95.0, 1)]));
    let back = h.monitor.run_once_at(t0() + secs(630)).await;
    assert!(back.iter().all(|e| e.metric_name != "cpu_usage"));

    let fired = h.monitor.run_once_at(t0() + secs(691)).await;
    let alert = fired.iter().find(|e| e.metric_name == "cpu_usage").unwrap();
    assert_eq!(alert.process_id, Some(4242));
    assert!(alert.message.contains("for 61s"));
}

#[tokio::test]
async fn test_tenant_dropped_from_directory_restarts_window() {
    let config = TenantConfig {
        metrics: vec![MetricRule::new(ProcessMetricKind::CpuUsage, 90.0, 60)],
        ..TenantConfig::default()
    };
    let mut h = tenant_harness(config);
    h.monitor.run_once_at(t0()).await;

    set(&h.directory, Some(vec![TenantIdentity::with_dns("b")]));
    h.monitor.run_once_at(t0() + secs(30)).await;

    let cpu = h
        .state
        .registries
        .gauges
        .get(&EntityKey::Tenant("a".to_string()), "cpu_usage")
        .unwrap();
    assert_eq!(cpu.with_metric(|m| m.breach_started_at()), None);
}

#[tokio::test]
async fn test_missing_record_flag_clears_when_record_appears_without_process() {
    let mut h = tenant_harness(tenant_config());
    h.monitor.run_once_at(t0()).await;
    let b = EntityKey::Tenant("b".to_string());
    let record_missing = h
        .state
        .registries
        .counters
        .get(&b, RECORD_MISSING_METRIC)
        .unwrap();
    assert_eq!(record_missing.with_metric(|m| m.current_value()), 1);

    set(
        &h.supervisor,
        Some(vec![SupervisorRecord::new("a", 100), SupervisorRecord::new("b", 777)]),
    );
    let fired = h.monitor.run_once_at(t0() + secs(30)).await;

    assert_eq!(record_missing.with_metric(|m| m.current_value()), 0);
    let process_missing = h
        .state
        .registries
        .counters
        .get(&b, PROCESS_MISSING_METRIC)
        .unwrap();
    assert_eq!(process_missing.with_metric(|m| m.current_value()), 1);
    let crashed = fired
        .iter()
        .find(|e| e.metric_name == PROCESS_MISSING_METRIC)
        .unwrap();
    assert_eq!(crashed.process_id, Some(777));
}

#[tokio::test]
async fn test_process_restart_restarts_sustained_window() {
    let table = shared(vec![live(10, "nginx", 99.0, 1)]);
    let registries = Arc::new(Registries::default());
    let mut monitor = ProcessMonitor::new(
        Box::new(FakeTable(table.clone())),
        vec![ProcessConfig {
            name: "nginx".to_string(),
            metrics: vec![MetricRule::new(ProcessMetricKind::CpuUsage, 90.0, 60)],
        }],
        registries.clone(),
        alerter(),
    );

    assert!(monitor.run_once_at(t0()).is_empty());
    set(&table, Some(Vec::new()));
    assert!(monitor.run_once_at(t0() + secs(20)).is_empty());

    set(&table, Some(vec![live(11, "nginx", 95.0, 1)]));
    assert!(monitor.run_once_at(t0() + secs(120)).is_empty());
    assert_eq!(monitor.run_once_at(t0() + secs(181)).len(), 1);
}
