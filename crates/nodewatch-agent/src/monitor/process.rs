use super::{ticker, Alerter, Subject};
use crate::config::{MetricRule, ProcessConfig};
use crate::state::Registries;
use chrono::{DateTime, Utc};
use nodewatch_alert::registry::EntityKey;
use nodewatch_alert::ThresholdPolicy;
use nodewatch_collector::kinds::{ProcessMetricKind, ProcessReading};
use nodewatch_collector::{name_matches, ProcessTable};
use nodewatch_common::types::{AlertEvent, LiveProcess};
use std::sync::Arc;
use std::time::Duration;

/// Per-process resource usage for the configured process names.
pub struct ProcessMonitor {
    table: Box<dyn ProcessTable>,
    processes: Vec<ProcessConfig>,
    registries: Arc<Registries>,
    alerter: Alerter,
}

impl ProcessMonitor {
    pub fn new(
        table: Box<dyn ProcessTable>,
        processes: Vec<ProcessConfig>,
        registries: Arc<Registries>,
        alerter: Alerter,
    ) -> Self {
        Self {
            table,
            processes,
            registries,
            alerter,
        }
    }

    pub async fn run(mut self, every: Duration) {
        let mut tick = ticker(every);
        tracing::info!(
            interval_secs = every.as_secs(),
            processes = self.processes.len(),
            "Process monitor started"
        );
        loop {
            tick.tick().await;
            self.run_once_at(Utc::now());
        }
    }

    pub fn run_once_at(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        if self.processes.is_empty() {
            return Vec::new();
        }
        let patterns = &self.processes;
        let live = match self
            .table
            .snapshot(&|name| patterns.iter().any(|p| name_matches(&p.name, name)))
        {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(error = %e, "Process table unavailable, skipping cycle");
                return Vec::new();
            }
        };

        let mut fired = Vec::new();
        for config in &self.processes {
            let matching: Vec<&LiveProcess> = live
                .iter()
                .filter(|p| name_matches(&config.name, &p.name))
                .collect();
            let entity = EntityKey::Process(config.name.clone());
            if matching.is_empty() {
                tracing::debug!(process = %config.name, "Process not running");
                self.registries.reset_windows(&entity);
                continue;
            }
            for rule in &config.metrics {
                fired.extend(observe_peak(
                    &self.registries,
                    &self.alerter,
                    entity.clone(),
                    rule,
                    matching.iter().copied(),
                    now,
                    |p| Subject::process(&p.name, p.process_id),
                ));
            }
        }
        fired
    }
}

/// Feeds the highest reading among `processes` into the metric `rule`
/// describes, in the gauge or counter registry depending on its type.
pub(crate) fn observe_peak<'a>(
    registries: &Registries,
    alerter: &Alerter,
    entity: EntityKey,
    rule: &MetricRule<ProcessMetricKind>,
    processes: impl IntoIterator<Item = &'a LiveProcess>,
    now: DateTime<Utc>,
    subject: impl FnOnce(&LiveProcess) -> Subject,
) -> Option<AlertEvent> {
    let (owner, reading) = rule.metric.peak(processes)?;
    let policy = rule.policy_or(ThresholdPolicy::SustainedBreach);
    let subject = subject(owner);
    match reading {
        ProcessReading::Percent(value) => {
            let handle = registries.gauges.get_or_create(
                entity,
                rule.metric.name(),
                policy,
                rule.threshold,
                rule.duration(),
            );
            alerter.evaluate(&handle, value, now, &subject)
        }
        ProcessReading::Count(value) => {
            let handle = registries.counters.get_or_create(
                entity,
                rule.metric.name(),
                policy,
                rule.threshold.max(0.0) as u64,
                rule.duration(),
            );
            alerter.evaluate(&handle, value, now, &subject)
        }
    }
}
