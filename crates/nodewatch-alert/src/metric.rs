use crate::{AlertDecision, Observation, ThresholdPolicy};
use chrono::{DateTime, Duration, Utc};

/// Breach bookkeeping. Each policy tracks exactly one timestamp, so the
/// other one cannot be set by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyState {
    Sustained {
        breach_started_at: Option<DateTime<Utc>>,
    },
    Cooldown {
        last_alert_at: Option<DateTime<Utc>>,
    },
}

impl PolicyState {
    fn initial(policy: ThresholdPolicy) -> Self {
        match policy {
            ThresholdPolicy::SustainedBreach => Self::Sustained {
                breach_started_at: None,
            },
            ThresholdPolicy::ImmediateWithCooldown => Self::Cooldown {
                last_alert_at: None,
            },
        }
    }
}

/// A named observation with its threshold and breach state.
#[derive(Debug, Clone)]
pub struct Metric<T: Observation> {
    name: String,
    current_value: T,
    threshold: T,
    /// Length of the sustained-breach window, or the cooldown between
    /// alerts, depending on the policy.
    sustained_duration: Duration,
    state: PolicyState,
    created_at: DateTime<Utc>,
    last_observed_at: Option<DateTime<Utc>>,
}

impl<T: Observation> Metric<T> {
    pub fn new(
        name: &str,
        policy: ThresholdPolicy,
        threshold: T,
        sustained_duration: std::time::Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            current_value: T::default(),
            threshold,
            sustained_duration: Duration::from_std(sustained_duration)
                .unwrap_or(Duration::MAX),
            state: PolicyState::initial(policy),
            created_at: Utc::now(),
            last_observed_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> ThresholdPolicy {
        match self.state {
            PolicyState::Sustained { .. } => ThresholdPolicy::SustainedBreach,
            PolicyState::Cooldown { .. } => ThresholdPolicy::ImmediateWithCooldown,
        }
    }

    pub fn current_value(&self) -> T {
        self.current_value
    }

    pub fn threshold(&self) -> T {
        self.threshold
    }

    pub fn sustained_duration(&self) -> Duration {
        self.sustained_duration
    }

    /// Start of the in-progress breach window. Always `None` for cooldown metrics.
    pub fn breach_started_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            PolicyState::Sustained { breach_started_at } => breach_started_at,
            PolicyState::Cooldown { .. } => None,
        }
    }

    /// Time of the last fired alert. Always `None` for sustained metrics.
    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            PolicyState::Cooldown { last_alert_at } => last_alert_at,
            PolicyState::Sustained { .. } => None,
        }
    }

    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        self.last_observed_at
    }

    /// When the metric was last fed, or created if it never was.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.last_observed_at.unwrap_or(self.created_at)
    }

    /// Forgets an open sustained-breach window. Called when the entity was
    /// not sampled, so a later breach has to last a full window on its own.
    /// Cooldown state is kept.
    pub fn reset_window(&mut self) {
        if let PolicyState::Sustained { breach_started_at } = &mut self.state {
            *breach_started_at = None;
        }
    }

    /// Records `value` as of now and decides whether to alert.
    pub fn observe(&mut self, value: T) -> AlertDecision {
        self.observe_at(value, Utc::now())
    }

    /// Records `value` as of `now` and decides whether to alert.
    pub fn observe_at(&mut self, value: T, now: DateTime<Utc>) -> AlertDecision {
        self.current_value = value;
        self.last_observed_at = Some(now);
        let breaching = value.exceeds(&self.threshold);

        match &mut self.state {
            PolicyState::Sustained { breach_started_at } => {
                if !breaching {
                    *breach_started_at = None;
                    return AlertDecision::suppress();
                }
                let Some(started) = *breach_started_at else {
                    *breach_started_at = Some(now);
                    return AlertDecision::suppress();
                };
                let elapsed = now - started;
                if elapsed < self.sustained_duration {
                    return AlertDecision::suppress();
                }
                // A breach that persists starts a fresh window on the next observation.
                *breach_started_at = None;
                AlertDecision::fire(format!(
                    "{} has been above {} for {}s (current value {})",
                    self.name,
                    self.threshold.render(),
                    elapsed.num_seconds(),
                    value.render(),
                ))
            }
            PolicyState::Cooldown { last_alert_at } => {
                if !breaching {
                    return AlertDecision::suppress();
                }
                let cooled_down = last_alert_at
                    .map_or(true, |last| now - last > self.sustained_duration);
                if !cooled_down {
                    tracing::trace!(metric = %self.name, "Alert suppressed (cooldown)");
                    return AlertDecision::suppress();
                }
                *last_alert_at = Some(now);
                AlertDecision::fire(format!(
                    "{} is {}, above threshold {}",
                    self.name,
                    value.render(),
                    self.threshold.render(),
                ))
            }
        }
    }
}
