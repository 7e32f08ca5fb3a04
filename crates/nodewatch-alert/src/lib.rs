//! Threshold engine for node-local health metrics.
//!
//! A [`metric::Metric`] owns its breach state and decides, observation by
//! observation, whether an alert should fire under its configured
//! [`ThresholdPolicy`]. Metrics are created and shared through the
//! [`registry::MetricRegistry`], keyed by the entity they describe, so breach
//! windows and cooldowns survive from one poll cycle to the next.

pub mod metric;
pub mod registry;


use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a metric turns a stream of observations into alerts.
///
/// # Examples
///
/// ```
/// use nodewatch_alert::ThresholdPolicy;
///
/// let p: ThresholdPolicy = "cooldown".parse().unwrap();
/// assert_eq!(p, ThresholdPolicy::ImmediateWithCooldown);
/// assert_eq!(ThresholdPolicy::SustainedBreach.to_string(), "sustained");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// Fire once the value has stayed above the threshold for the whole
    /// configured duration, then start a new window.
    #[serde(rename = "sustained")]
    SustainedBreach,
    /// Fire on the first breaching observation, then stay quiet for the
    /// configured duration.
    #[serde(rename = "cooldown")]
    ImmediateWithCooldown,
}

impl std::fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SustainedBreach => write!(f, "sustained"),
            Self::ImmediateWithCooldown => write!(f, "cooldown"),
        }
    }
}

impl std::str::FromStr for ThresholdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sustained" | "sustained_breach" => Ok(Self::SustainedBreach),
            "cooldown" | "immediate" | "immediate_with_cooldown" => {
                Ok(Self::ImmediateWithCooldown)
            }
            _ => Err(format!("unknown threshold policy: {s}")),
        }
    }
}

/// Outcome of a single observation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertDecision {
    pub fire: bool,
    pub message: Option<String>,
}

impl AlertDecision {
    pub fn suppress() -> Self {
        Self::default()
    }

    pub fn fire(message: String) -> Self {
        Self {
            fire: true,
            message: Some(message),
        }
    }
}

/// A value that can be compared against a threshold.
///
/// Implemented for the float, integer and duration observations the
/// watchdog samples. Comparison is strictly greater-than: a value equal to
/// its threshold never counts as a breach.
pub trait Observation: Copy + Default + Send + Sync + 'static {
    /// Returns `true` when `self` is strictly above `threshold`.
    fn exceeds(&self, threshold: &Self) -> bool;

    /// Numeric projection used in alert payloads and status snapshots.
    fn as_f64(&self) -> f64;

    /// Human-readable rendering used in alert messages.
    fn render(&self) -> String;
}

impl Observation for f64 {
    // NaN compares false against everything, so a broken sample never fires.
    fn exceeds(&self, threshold: &Self) -> bool {
        *self > *threshold
    }

    fn as_f64(&self) -> f64 {
        *self
    }

    fn render(&self) -> String {
        format!("{self:.2}")
    }
}

impl Observation for u64 {
    fn exceeds(&self, threshold: &Self) -> bool {
        self > threshold
    }

    fn as_f64(&self) -> f64 {
        *self as f64
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl Observation for i64 {
    fn exceeds(&self, threshold: &Self) -> bool {
        self > threshold
    }

    fn as_f64(&self) -> f64 {
        *self as f64
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl Observation for Duration {
    fn exceeds(&self, threshold: &Self) -> bool {
        self > threshold
    }

    fn as_f64(&self) -> f64 {
        self.as_secs_f64()
    }

    fn render(&self) -> String {
        format!("{:.3}s", self.as_secs_f64())
    }
}
