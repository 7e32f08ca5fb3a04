use chrono::{DateTime, Utc};
use nodewatch_alert::registry::{EntityKey, EntityKind, MetricRegistry, MetricSnapshot};
use nodewatch_tenant::reconcile::ReconciliationSummary;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The metric registries, one per observation type.
#[derive(Default)]
pub struct Registries {
    /// Percentages, load averages.
    pub gauges: MetricRegistry<f64>,
    /// Connection counts, disk I/O counters, mismatch flags.
    pub counters: MetricRegistry<u64>,
    /// Collaborator round-trip times.
    pub latencies: MetricRegistry<Duration>,
}

impl Registries {
    /// Snapshots of every metric of `kind`, sorted by entity then metric name.
    pub fn snapshots(&self, kind: EntityKind) -> Vec<MetricSnapshot> {
        let mut out: Vec<MetricSnapshot> = self
            .gauges
            .list(kind)
            .iter()
            .map(|h| h.snapshot())
            .chain(self.counters.list(kind).iter().map(|h| h.snapshot()))
            .chain(self.latencies.list(kind).iter().map(|h| h.snapshot()))
            .collect();
        out.sort_by(|a, b| a.entity.cmp(&b.entity).then_with(|| a.metric.cmp(&b.metric)));
        out
    }

    /// Entities of `kind` present in any registry, without duplicates.
    pub fn entities(&self, kind: EntityKind) -> Vec<EntityKey> {
        let mut seen = HashSet::new();
        self.gauges
            .entities(kind)
            .into_iter()
            .chain(self.counters.entities(kind))
            .chain(self.latencies.entities(kind))
            .filter(|entity| seen.insert(entity.clone()))
            .collect()
    }

    /// Clears open sustained-breach windows for `entity` in every registry.
    pub fn reset_windows(&self, entity: &EntityKey) {
        let touched = self.gauges.reset_windows(entity)
            + self.counters.reset_windows(entity)
            + self.latencies.reset_windows(entity);
        if touched > 0 {
            tracing::debug!(entity = %entity, metrics = touched, "Breach windows reset");
        }
    }

    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len() + self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of the most recent tenant reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub completed_at: DateTime<Utc>,
    /// The directory fetch failed and the last known tenant list was used.
    pub directory_stale: bool,
    /// The supervisor fetch failed and the last known records were used.
    pub supervisor_stale: bool,
    #[serde(flatten)]
    pub summary: ReconciliationSummary,
}

#[derive(Clone)]
pub struct AppState {
    pub node_id: Arc<String>,
    pub registries: Arc<Registries>,
    pub last_reconciliation: Arc<Mutex<Option<ReconciliationReport>>>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: Arc::new(node_id.to_string()),
            registries: Arc::new(Registries::default()),
            last_reconciliation: Arc::new(Mutex::new(None)),
            start_time: Utc::now(),
        }
    }

    pub fn record_reconciliation(&self, report: ReconciliationReport) {
        *self
            .last_reconciliation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report);
    }

    pub fn reconciliation(&self) -> Option<ReconciliationReport> {
        self.last_reconciliation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
