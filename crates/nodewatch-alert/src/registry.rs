use crate::metric::Metric;
use crate::{AlertDecision, Observation, ThresholdPolicy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Category of a monitored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    System,
    Disk,
    Process,
    Tenant,
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "disk" => Ok(Self::Disk),
            "process" => Ok(Self::Process),
            "tenant" => Ok(Self::Tenant),
            _ => Err(format!("unknown entity kind: {s}")),
        }
    }
}

/// Identifies the entity a metric belongs to: the host itself, a disk
/// mount, a named process or a tenant dns name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    System,
    Disk(String),
    Process(String),
    Tenant(String),
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::System => EntityKind::System,
            Self::Disk(_) => EntityKind::Disk,
            Self::Process(_) => EntityKind::Process,
            Self::Tenant(_) => EntityKind::Tenant,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Disk(name) | Self::Process(name) | Self::Tenant(name) => name,
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Disk(name) => write!(f, "disk {name}"),
            Self::Process(name) => write!(f, "process {name}"),
            Self::Tenant(name) => write!(f, "tenant {name}"),
        }
    }
}

/// Point-in-time view of one metric, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub entity_kind: EntityKind,
    pub entity: String,
    pub metric: String,
    pub policy: ThresholdPolicy,
    pub value: f64,
    pub threshold: f64,
    pub duration_secs: i64,
    pub breach_started_at: Option<DateTime<Utc>>,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// Shared handle to a registered metric.
///
/// Every evaluation goes through the metric's own lock, so the
/// compare-and-update sequence is atomic even when two code paths observe
/// the same metric concurrently.
pub struct MetricHandle<T: Observation> {
    entity: EntityKey,
    inner: Arc<Mutex<Metric<T>>>,
}

impl<T: Observation> Clone for MetricHandle<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Observation> MetricHandle<T> {
    fn new(entity: EntityKey, metric: Metric<T>) -> Self {
        Self {
            entity,
            inner: Arc::new(Mutex::new(metric)),
        }
    }

    pub fn entity(&self) -> &EntityKey {
        &self.entity
    }

    pub fn observe(&self, value: T) -> AlertDecision {
        self.lock().observe(value)
    }

    pub fn observe_at(&self, value: T, now: DateTime<Utc>) -> AlertDecision {
        self.lock().observe_at(value, now)
    }

    pub fn reset_window(&self) {
        self.lock().reset_window();
    }

    /// Runs `f` against the metric while holding its lock.
    pub fn with_metric<R>(&self, f: impl FnOnce(&Metric<T>) -> R) -> R {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let metric = self.lock();
        MetricSnapshot {
            entity_kind: self.entity.kind(),
            entity: self.entity.name().to_string(),
            metric: metric.name().to_string(),
            policy: metric.policy(),
            value: metric.current_value().as_f64(),
            threshold: metric.threshold().as_f64(),
            duration_secs: metric.sustained_duration().num_seconds(),
            breach_started_at: metric.breach_started_at(),
            last_alert_at: metric.last_alert_at(),
            last_observed_at: metric.last_observed_at(),
        }
    }

    /// Two handles are the same when they share the underlying metric.
    pub fn same_metric(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Metric<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type EntityMetrics<T> = HashMap<String, MetricHandle<T>>;

/// Per-entity collection of metrics, created lazily on first observation.
///
/// Entries live for the lifetime of the registry unless explicitly purged
/// with [`MetricRegistry::purge_stale`].
pub struct MetricRegistry<T: Observation> {
    entries: RwLock<HashMap<EntityKey, EntityMetrics<T>>>,
}

impl<T: Observation> Default for MetricRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Observation> MetricRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the metric registered under `(entity, name)`, creating it
    /// with the given policy if this is the first time it is seen.
    ///
    /// Configuration passed for an existing metric is ignored: the live
    /// instance keeps its breach state.
    pub fn get_or_create(
        &self,
        entity: EntityKey,
        name: &str,
        policy: ThresholdPolicy,
        threshold: T,
        duration: Duration,
    ) -> MetricHandle<T> {
        if let Some(handle) = self.get(&entity, name) {
            return handle;
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let metrics = entries.entry(entity.clone()).or_default();
        metrics
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(entity = %entity, metric = name, %policy, "Registering metric");
                MetricHandle::new(entity, Metric::new(name, policy, threshold, duration))
            })
            .clone()
    }

    pub fn get(&self, entity: &EntityKey, name: &str) -> Option<MetricHandle<T>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(entity).and_then(|m| m.get(name)).cloned()
    }

    /// All metrics registered for entities of `kind`.
    pub fn list(&self, kind: EntityKind) -> Vec<MetricHandle<T>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .iter()
            .filter(|(key, _)| key.kind() == kind)
            .flat_map(|(_, metrics)| metrics.values().cloned())
            .collect()
    }

    /// Clears the sustained-breach window of every metric of `entity`.
    /// Returns how many metrics were touched.
    pub fn reset_windows(&self, entity: &EntityKey) -> usize {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(metrics) = entries.get(entity) else {
            return 0;
        };
        for handle in metrics.values() {
            handle.reset_window();
        }
        metrics.len()
    }

    pub fn entities(&self, kind: EntityKind) -> Vec<EntityKey> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.keys().filter(|k| k.kind() == kind).cloned().collect()
    }

    pub fn len(&self) -> usize {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes entities of `kind` none of whose metrics were observed within
    /// `ttl` of `now`. Returns the removed keys.
    pub fn purge_stale(
        &self,
        kind: EntityKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Vec<EntityKey> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let stale: Vec<EntityKey> = entries
            .iter()
            .filter(|(key, _)| key.kind() == kind)
            .filter(|(_, metrics)| {
                metrics
                    .values()
                    .all(|h| h.with_metric(|m| now - m.last_touched() > ttl))
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            entries.remove(key);
        }
        stale
    }
}
