//! Poll loops.
//!
//! Each monitor owns its collaborators and runs on its own interval. A
//! cycle samples, feeds the values into the shared registries and hands
//! every fired decision to the [`Alerter`]. Fetch failures are logged and
//! the loop carries on with the next tick.

pub mod process;
pub mod system;
pub mod tenant;

use chrono::{DateTime, Utc};
use nodewatch_alert::registry::{EntityKey, MetricHandle};
use nodewatch_alert::Observation;
use nodewatch_common::types::{AlertEvent, EntityType};
use nodewatch_notify::notifier::Notifier;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Extra context attached to an alert.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    pub process: Option<(String, u32)>,
    pub tenant: Option<String>,
}

impl Subject {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn process(name: &str, pid: u32) -> Self {
        Self {
            process: Some((name.to_string(), pid)),
            tenant: None,
        }
    }

    pub fn tenant(dns: &str, process: Option<(&str, u32)>) -> Self {
        Self {
            process: process.map(|(name, pid)| (name.to_string(), pid)),
            tenant: Some(dns.to_string()),
        }
    }
}

/// Turns fired decisions into alert events and dispatches them.
#[derive(Clone)]
pub struct Alerter {
    node_id: String,
    notifier: Notifier,
}

impl Alerter {
    pub fn new(node_id: &str, notifier: Notifier) -> Self {
        Self {
            node_id: node_id.to_string(),
            notifier,
        }
    }

    /// Observes `value` on `handle`; when the policy fires, dispatches an
    /// alert and returns a copy of it.
    pub fn evaluate<T: Observation>(
        &self,
        handle: &MetricHandle<T>,
        value: T,
        now: DateTime<Utc>,
        subject: &Subject,
    ) -> Option<AlertEvent> {
        let decision = handle.observe_at(value, now);
        if !decision.fire {
            return None;
        }

        let entity = handle.entity();
        let (name, threshold) = handle.with_metric(|m| (m.name().to_string(), m.threshold()));
        let message = decision.message.unwrap_or_default();
        let (entity_type, metric_name, message) = match entity {
            EntityKey::System => (EntityType::System, name, message),
            // disks travel as system alerts, the mount goes into the name
            EntityKey::Disk(mount) => (
                EntityType::System,
                format!("{name}:{mount}"),
                format!("{entity}: {message}"),
            ),
            EntityKey::Process(_) => (EntityType::Process, name, format!("{entity}: {message}")),
            EntityKey::Tenant(_) => (EntityType::Tenant, name, format!("{entity}: {message}")),
        };

        let mut event = AlertEvent::notify(
            entity_type,
            &self.node_id,
            &metric_name,
            value.as_f64(),
            threshold.as_f64(),
            message,
        );
        event.timestamp = now;
        if let Some((name, pid)) = &subject.process {
            event = event.with_process(name, *pid);
        }
        if let Some(dns) = &subject.tenant {
            event = event.with_tenant(dns);
        }

        tracing::info!(
            entity = %entity,
            metric = %event.metric_name,
            value = %value.render(),
            threshold = %threshold.render(),
            "Alert fired"
        );
        self.notifier.dispatch(event.clone());
        Some(event)
    }
}

/// Interval for a poll loop. A slow cycle delays the next tick instead of
/// bunching the missed ones.
pub fn ticker(every: Duration) -> Interval {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}
