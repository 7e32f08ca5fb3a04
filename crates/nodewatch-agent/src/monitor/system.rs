use super::{ticker, Alerter, Subject};
use crate::config::{DiskConfig, MetricRule};
use crate::state::Registries;
use chrono::{DateTime, Utc};
use nodewatch_alert::registry::EntityKey;
use nodewatch_alert::ThresholdPolicy;
use nodewatch_collector::kinds::SystemMetricKind;
use nodewatch_collector::SystemStatsSource;
use nodewatch_common::types::AlertEvent;
use std::sync::Arc;
use std::time::Duration;

/// Host resources, disk usage and disk I/O counters.
pub struct SystemMonitor {
    source: Box<dyn SystemStatsSource>,
    metrics: Vec<MetricRule<SystemMetricKind>>,
    disks: Vec<DiskConfig>,
    registries: Arc<Registries>,
    alerter: Alerter,
}

impl SystemMonitor {
    pub fn new(
        source: Box<dyn SystemStatsSource>,
        metrics: Vec<MetricRule<SystemMetricKind>>,
        disks: Vec<DiskConfig>,
        registries: Arc<Registries>,
        alerter: Alerter,
    ) -> Self {
        Self {
            source,
            metrics,
            disks,
            registries,
            alerter,
        }
    }

    pub async fn run(mut self, every: Duration) {
        let mut tick = ticker(every);
        tracing::info!(interval_secs = every.as_secs(), "System monitor started");
        loop {
            tick.tick().await;
            self.run_once_at(Utc::now());
        }
    }

    /// One sampling cycle. Returns the alerts it raised.
    pub fn run_once_at(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let snapshot = match self.source.sample() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "System stats unavailable, skipping cycle");
                return Vec::new();
            }
        };
        let mut fired = Vec::new();

        for rule in &self.metrics {
            let handle = self.registries.gauges.get_or_create(
                EntityKey::System,
                rule.metric.name(),
                rule.policy_or(ThresholdPolicy::SustainedBreach),
                rule.threshold,
                rule.duration(),
            );
            let value = rule.metric.read(&snapshot);
            fired.extend(self.alerter.evaluate(&handle, value, now, &Subject::none()));
        }

        for sample in &snapshot.disks {
            let Some(disk) = self.disks.iter().find(|d| d.mount == sample.mount) else {
                tracing::debug!(mount = %sample.mount, "Unconfigured mount, skipping");
                continue;
            };
            let entity = EntityKey::Disk(disk.mount.clone());

            let usage = self.registries.gauges.get_or_create(
                entity.clone(),
                "disk_usage",
                disk.usage.policy.unwrap_or(ThresholdPolicy::ImmediateWithCooldown),
                disk.usage.threshold,
                Duration::from_secs(disk.usage.duration_secs),
            );
            fired.extend(self.alerter.evaluate(&usage, sample.usage_percent, now, &Subject::none()));

            let Some(io) = &sample.io else {
                tracing::debug!(mount = %sample.mount, device = %sample.device, "No I/O counters for device");
                continue;
            };
            for rule in &disk.io {
                let handle = self.registries.counters.get_or_create(
                    entity.clone(),
                    rule.metric.name(),
                    rule.policy_or(ThresholdPolicy::ImmediateWithCooldown),
                    rule.threshold,
                    rule.duration(),
                );
                let value = rule.metric.read(io);
                fired.extend(self.alerter.evaluate(&handle, value, now, &Subject::none()));
            }
        }

        tracing::debug!(
            disks = snapshot.disks.len(),
            fired = fired.len(),
            "System cycle complete"
        );
        fired
    }
}
