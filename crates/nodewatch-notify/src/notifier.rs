use crate::NotificationSink;
use nodewatch_common::types::AlertEvent;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fire-and-forget fan-out of alert events to every sink.
#[derive(Clone)]
pub struct Notifier {
    sinks: Arc<Vec<Arc<dyn NotificationSink>>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Spawns delivery of `event` and returns immediately. Callers normally
    /// drop the handle; tests await it.
    pub fn dispatch(&self, event: AlertEvent) -> JoinHandle<()> {
        let sinks = Arc::clone(&self.sinks);
        tokio::spawn(async move {
            for sink in sinks.iter() {
                match sink.send(&event).await {
                    Ok(()) => tracing::debug!(
                        sink = sink.sink_name(),
                        metric = %event.metric_name,
                        "Alert delivered"
                    ),
                    Err(e) => tracing::error!(
                        sink = sink.sink_name(),
                        metric = %event.metric_name,
                        error = %e,
                        "Alert delivery failed"
                    ),
                }
            }
        })
    }
}
