use super::process::observe_peak;
use super::{ticker, Alerter, Subject};
use crate::config::TenantConfig;
use crate::state::{AppState, ReconciliationReport};
use chrono::{DateTime, Utc};
use nodewatch_alert::registry::{EntityKey, EntityKind};
use nodewatch_alert::ThresholdPolicy;
use nodewatch_collector::ProcessTable;
use nodewatch_common::types::{AlertEvent, SupervisorRecord, TenantIdentity};
use nodewatch_tenant::reconcile::reconcile;
use nodewatch_tenant::{SupervisorSource, TenantDirectory};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub const DIRECTORY_LATENCY_METRIC: &str = "directory_fetch_latency";
pub const RECORD_MISSING_METRIC: &str = "supervisor_record_missing";
pub const PROCESS_MISSING_METRIC: &str = "process_missing";

/// Reconciles the tenant directory, the supervisor and the process table,
/// then evaluates per-tenant metrics.
pub struct TenantMonitor {
    node_id: String,
    directory: Box<dyn TenantDirectory>,
    supervisor: Box<dyn SupervisorSource>,
    table: Box<dyn ProcessTable>,
    config: TenantConfig,
    state: AppState,
    alerter: Alerter,
    last_tenants: Option<Vec<TenantIdentity>>,
    last_records: Option<Vec<SupervisorRecord>>,
}

impl TenantMonitor {
    pub fn new(
        directory: Box<dyn TenantDirectory>,
        supervisor: Box<dyn SupervisorSource>,
        table: Box<dyn ProcessTable>,
        config: TenantConfig,
        state: AppState,
        alerter: Alerter,
    ) -> Self {
        Self {
            node_id: state.node_id.to_string(),
            directory,
            supervisor,
            table,
            config,
            state,
            alerter,
            last_tenants: None,
            last_records: None,
        }
    }

    pub async fn run(mut self, every: Duration) {
        let mut tick = ticker(every);
        tracing::info!(
            interval_secs = every.as_secs(),
            process = %self.config.process_name,
            "Tenant monitor started"
        );
        loop {
            tick.tick().await;
            self.run_once_at(Utc::now()).await;
        }
    }

    async fn fetch_tenants(
        &mut self,
        now: DateTime<Utc>,
        fired: &mut Vec<AlertEvent>,
    ) -> (Vec<TenantIdentity>, bool) {
        let started = Instant::now();
        match self.directory.fetch_tenants(&self.node_id).await {
            Ok(tenants) => {
                let rule = &self.config.directory_latency;
                let handle = self.state.registries.latencies.get_or_create(
                    EntityKey::System,
                    DIRECTORY_LATENCY_METRIC,
                    rule.policy.unwrap_or(ThresholdPolicy::SustainedBreach),
                    Duration::from_millis(rule.threshold_ms),
                    Duration::from_secs(rule.duration_secs),
                );
                fired.extend(self.alerter.evaluate(&handle, started.elapsed(), now, &Subject::none()));
                self.last_tenants = Some(tenants.clone());
                (tenants, false)
            }
            Err(e) => {
                let fallback = self.last_tenants.clone().unwrap_or_default();
                tracing::warn!(
                    error = %e,
                    fallback_tenants = fallback.len(),
                    "Tenant directory fetch failed, using last known list"
                );
                (fallback, true)
            }
        }
    }

    async fn fetch_records(&mut self) -> (Vec<SupervisorRecord>, bool) {
        match self.supervisor.fetch_records().await {
            Ok(records) => {
                self.last_records = Some(records.clone());
                (records, false)
            }
            Err(e) => {
                let fallback = self.last_records.clone().unwrap_or_default();
                tracing::warn!(
                    error = %e,
                    fallback_records = fallback.len(),
                    "Supervisor records unavailable, using last known records"
                );
                (fallback, true)
            }
        }
    }

    /// One reconciliation cycle. Returns the alerts it raised.
    pub async fn run_once_at(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut fired = Vec::new();
        let (tenants, directory_stale) = self.fetch_tenants(now, &mut fired).await;
        let (records, supervisor_stale) = self.fetch_records().await;

        let process_name = self.config.process_name.clone();
        let live = match self.table.snapshot(&|name| name == process_name) {
            Ok(live) => live,
            Err(e) => {
                // an empty table would flag every tenant as crashed
                tracing::warn!(error = %e, "Process table unavailable, skipping tenant evaluation");
                return fired;
            }
        };

        let result = reconcile(&tenants, &records, &live);
        let registries = &self.state.registries;
        let mismatch_cooldown = Duration::from_secs(self.config.mismatch_cooldown_secs);

        for matched in &result.matched {
            let dns = matched.tenant.dns.as_str();
            let entity = EntityKey::Tenant(dns.to_string());
            let pid = matched.live_process.process_id;
            for rule in self.config.rules_for(dns) {
                fired.extend(observe_peak(
                    registries,
                    &self.alerter,
                    entity.clone(),
                    &rule,
                    std::iter::once(&matched.live_process),
                    now,
                    |p| Subject::tenant(dns, Some((p.name.as_str(), p.process_id))),
                ));
            }
            for name in [RECORD_MISSING_METRIC, PROCESS_MISSING_METRIC] {
                if let Some(handle) = registries.counters.get(&entity, name) {
                    let subject = Subject::tenant(dns, Some((process_name.as_str(), pid)));
                    fired.extend(self.alerter.evaluate(&handle, 0, now, &subject));
                }
            }
        }

        for tenant in &result.tenants_without_supervisor_record {
            tracing::warn!(tenant = %tenant.dns, "Tenant assigned but unknown to the supervisor");
            let handle = registries.counters.get_or_create(
                EntityKey::Tenant(tenant.dns.clone()),
                RECORD_MISSING_METRIC,
                ThresholdPolicy::ImmediateWithCooldown,
                0,
                mismatch_cooldown,
            );
            fired.extend(self.alerter.evaluate(&handle, 1, now, &Subject::tenant(&tenant.dns, None)));
        }

        for record in &result.supervisor_records_without_process {
            tracing::warn!(
                tenant = %record.dns,
                expected_pid = record.expected_process_id,
                "Supervisor expects a process that is not running"
            );
            let entity = EntityKey::Tenant(record.dns.clone());
            let subject = Subject::tenant(
                &record.dns,
                Some((process_name.as_str(), record.expected_process_id)),
            );
            // the record exists now, whatever the last cycle saw
            if let Some(stale) = registries.counters.get(&entity, RECORD_MISSING_METRIC) {
                fired.extend(self.alerter.evaluate(&stale, 0, now, &subject));
            }
            let handle = registries.counters.get_or_create(
                entity,
                PROCESS_MISSING_METRIC,
                ThresholdPolicy::ImmediateWithCooldown,
                0,
                mismatch_cooldown,
            );
            fired.extend(self.alerter.evaluate(&handle, 1, now, &subject));
        }

        let sampled: HashSet<&str> = result
            .matched
            .iter()
            .map(|m| m.tenant.dns.as_str())
            .collect();
        self.reset_unsampled(&sampled);

        let summary = result.summary();
        tracing::debug!(
            tenants = summary.directory_tenants,
            matched = summary.matched.len(),
            without_record = summary.tenants_without_supervisor_record.len(),
            without_process = summary.supervisor_records_without_process.len(),
            "Tenant reconciliation complete"
        );
        self.state.record_reconciliation(ReconciliationReport {
            completed_at: now,
            directory_stale,
            supervisor_stale,
            summary,
        });

        if let Some(ttl) = self.config.stale_entity_ttl_secs {
            self.purge_stale(Duration::from_secs(ttl), now);
        }
        fired
    }

    /// A tenant without a live process this cycle has a gap in its
    /// samples, so any open breach window must start over.
    fn reset_unsampled(&self, sampled: &HashSet<&str>) {
        let registries = &self.state.registries;
        for entity in registries.entities(EntityKind::Tenant) {
            if !sampled.contains(entity.name()) {
                registries.reset_windows(&entity);
            }
        }
    }

    fn purge_stale(&self, ttl: Duration, now: DateTime<Utc>) {
        let registries = &self.state.registries;
        let mut purged = registries.gauges.purge_stale(EntityKind::Tenant, ttl, now);
        purged.extend(registries.counters.purge_stale(EntityKind::Tenant, ttl, now));
        purged.extend(registries.latencies.purge_stale(EntityKind::Tenant, ttl, now));
        purged.sort_by(|a, b| a.name().cmp(b.name()));
        purged.dedup();
        for entity in &purged {
            tracing::info!(entity = %entity, "Dropped metrics for vanished tenant");
        }
    }
}
