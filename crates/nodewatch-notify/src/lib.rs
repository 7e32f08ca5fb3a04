//! Alert delivery.
//!
//! Poll loops hand every fired [`AlertEvent`] to a [`notifier::Notifier`],
//! which fans it out to the configured [`NotificationSink`]s on a background
//! task. Delivery failures are logged and dropped.

pub mod error;
pub mod log;
pub mod notifier;
pub mod webhook;


use anyhow::Result;
use async_trait::async_trait;
use nodewatch_common::types::AlertEvent;

/// A destination for alert events (management plane webhook, log, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery failed after the sink's own retries.
    async fn send(&self, event: &AlertEvent) -> Result<()>;

    /// Short name used in logs, e.g. `"webhook"`.
    fn sink_name(&self) -> &str;
}
