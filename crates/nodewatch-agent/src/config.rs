use nodewatch_alert::ThresholdPolicy;
use nodewatch_collector::kinds::{DiskIoMetricKind, ProcessMetricKind, SystemMetricKind};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Identifier this node is known by in the tenant directory.
    pub node_id: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub intervals: IntervalConfig,
    /// Tenant reconciliation is disabled when no directory is configured.
    pub directory: Option<DirectoryConfig>,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default = "default_disks")]
    pub disks: Vec<DiskConfig>,
    #[serde(default)]
    pub processes: Vec<ProcessConfig>,
    #[serde(default)]
    pub tenant: TenantConfig,
}

/// One threshold rule: which metric, how breaches turn into alerts, and the
/// duration the policy works with (breach window or cooldown).
#[derive(Debug, Clone, Deserialize)]
pub struct MetricRule<K, V = f64> {
    pub metric: K,
    #[serde(default)]
    pub policy: Option<ThresholdPolicy>,
    pub threshold: V,
    #[serde(default = "default_rule_duration_secs")]
    pub duration_secs: u64,
}

impl<K, V> MetricRule<K, V> {
    pub fn new(metric: K, threshold: V, duration_secs: u64) -> Self {
        Self {
            metric,
            policy: None,
            threshold,
            duration_secs,
        }
    }

    pub fn policy_or(&self, fallback: ThresholdPolicy) -> ThresholdPolicy {
        self.policy.unwrap_or(fallback)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_system_interval_secs")]
    pub system_secs: u64,
    #[serde(default = "default_process_interval_secs")]
    pub process_secs: u64,
    #[serde(default = "default_tenant_interval_secs")]
    pub tenant_secs: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            system_secs: default_system_interval_secs(),
            process_secs: default_process_interval_secs(),
            tenant_secs: default_tenant_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_records_dir")]
    pub records_dir: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Alerts only go to the log when unset.
    pub webhook_url: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_system_metrics")]
    pub metrics: Vec<MetricRule<SystemMetricKind>>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            metrics: default_system_metrics(),
        }
    }
}

/// Disk usage threshold. Cooldown policy unless stated otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageRule {
    #[serde(default)]
    pub policy: Option<ThresholdPolicy>,
    pub threshold: f64,
    #[serde(default = "default_disk_duration_secs")]
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskConfig {
    pub mount: String,
    #[serde(default = "default_disk_usage")]
    pub usage: UsageRule,
    #[serde(default = "default_disk_io")]
    pub io: Vec<MetricRule<DiskIoMetricKind, u64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// Process name, shell globs allowed (`nginx*`).
    pub name: String,
    #[serde(default = "default_process_metrics")]
    pub metrics: Vec<MetricRule<ProcessMetricKind>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantOverride {
    pub dns: String,
    pub metrics: Vec<MetricRule<ProcessMetricKind>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatencyRule {
    #[serde(default)]
    pub policy: Option<ThresholdPolicy>,
    pub threshold_ms: u64,
    #[serde(default = "default_rule_duration_secs")]
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    /// Name of the storage server binary every tenant runs.
    #[serde(default = "default_tenant_process_name")]
    pub process_name: String,
    #[serde(default = "default_process_metrics")]
    pub metrics: Vec<MetricRule<ProcessMetricKind>>,
    #[serde(default)]
    pub overrides: Vec<TenantOverride>,
    #[serde(default = "default_mismatch_cooldown_secs")]
    pub mismatch_cooldown_secs: u64,
    /// Tenant metrics not observed for this long are dropped. Kept forever
    /// when unset.
    #[serde(default)]
    pub stale_entity_ttl_secs: Option<u64>,
    #[serde(default = "default_directory_latency")]
    pub directory_latency: LatencyRule,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            process_name: default_tenant_process_name(),
            metrics: default_process_metrics(),
            overrides: Vec::new(),
            mismatch_cooldown_secs: default_mismatch_cooldown_secs(),
            stale_entity_ttl_secs: None,
            directory_latency: default_directory_latency(),
        }
    }
}

impl TenantConfig {
    /// Rules for one tenant: the defaults, with any override for the same
    /// metric replacing the default rule.
    pub fn rules_for(&self, dns: &str) -> Vec<MetricRule<ProcessMetricKind>> {
        let mut rules = self.metrics.clone();
        for over in self.overrides.iter().filter(|o| o.dns == dns) {
            for rule in &over.metrics {
                match rules.iter_mut().find(|r| r.metric == rule.metric) {
                    Some(existing) => *existing = rule.clone(),
                    None => rules.push(rule.clone()),
                }
            }
        }
        rules
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_system_interval_secs() -> u64 {
    15
}

fn default_process_interval_secs() -> u64 {
    20
}

fn default_tenant_interval_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_records_dir() -> String {
    "/opt/e2-node-controller-1/running_processes".to_string()
}

fn default_rule_duration_secs() -> u64 {
    60
}

fn default_disk_duration_secs() -> u64 {
    300
}

fn default_system_metrics() -> Vec<MetricRule<SystemMetricKind>> {
    vec![
        MetricRule::new(SystemMetricKind::AvgLoad1, 2.0, 60),
        MetricRule::new(SystemMetricKind::CpuUsage, 90.0, 60),
        MetricRule::new(SystemMetricKind::MemoryUsage, 90.0, 60),
    ]
}

fn default_disks() -> Vec<DiskConfig> {
    vec![DiskConfig {
        mount: "/".to_string(),
        usage: default_disk_usage(),
        io: default_disk_io(),
    }]
}

fn default_disk_usage() -> UsageRule {
    UsageRule {
        policy: None,
        threshold: 50.0,
        duration_secs: default_disk_duration_secs(),
    }
}

fn default_disk_io() -> Vec<MetricRule<DiskIoMetricKind, u64>> {
    vec![
        MetricRule::new(DiskIoMetricKind::ReadBytes, 100_000_000_000_000, 300),
        MetricRule::new(DiskIoMetricKind::WriteBytes, 100_000_000_000_000, 300),
        MetricRule::new(DiskIoMetricKind::ReadCount, 100_000_000_000, 300),
        MetricRule::new(DiskIoMetricKind::WriteCount, 10_000_000_000, 300),
    ]
}

fn default_process_metrics() -> Vec<MetricRule<ProcessMetricKind>> {
    vec![
        MetricRule::new(ProcessMetricKind::CpuUsage, 90.0, 60),
        MetricRule::new(ProcessMetricKind::MemUsage, 20.0, 60),
        MetricRule::new(ProcessMetricKind::ConnCount, 15.0, 60),
    ]
}

fn default_tenant_process_name() -> String {
    "minio".to_string()
}

fn default_mismatch_cooldown_secs() -> u64 {
    300
}

fn default_directory_latency() -> LatencyRule {
    LatencyRule {
        policy: None,
        threshold_ms: 5_000,
        duration_secs: default_rule_duration_secs(),
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_id.trim().is_empty() {
            anyhow::bail!("node_id must not be empty");
        }
        let intervals = [
            ("system", self.intervals.system_secs),
            ("process", self.intervals.process_secs),
            ("tenant", self.intervals.tenant_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                anyhow::bail!("intervals.{name}_secs must be greater than zero");
            }
        }
        if let Some(dir) = &self.directory {
            if dir.url.trim().is_empty() {
                anyhow::bail!("directory.url must not be empty");
            }
        }
        if let Some(p) = self.processes.iter().find(|p| p.name.trim().is_empty()) {
            anyhow::bail!("processes entry with empty name: {p:?}");
        }
        if self.tenant.process_name.trim().is_empty() {
            anyhow::bail!("tenant.process_name must not be empty");
        }
        Ok(())
    }
}
