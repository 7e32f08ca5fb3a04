use crate::NotificationSink;
use anyhow::Result;
use async_trait::async_trait;
use nodewatch_common::types::AlertEvent;

/// Writes alerts to the log. Used when no webhook is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        tracing::warn!(
            monitor_type = %event.entity_type,
            node_id = %event.node_id,
            metric = %event.metric_name,
            value = event.metric_value,
            threshold = event.threshold,
            process = event.process_name.as_deref().unwrap_or("-"),
            tenant = event.tenant_dns.as_deref().unwrap_or("-"),
            "[ALERT] {}",
            event.message
        );
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "log"
    }
}
