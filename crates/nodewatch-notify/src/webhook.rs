use crate::error::{NotifyError, Result};
use crate::NotificationSink;
use async_trait::async_trait;
use nodewatch_common::types::AlertEvent;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const MAX_BODY_LENGTH: usize = 512;

/// Posts alert events as JSON to the management plane.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    backoff_base: Duration,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            backoff_base: Duration::from_millis(100),
        })
    }

    /// Overrides the first retry delay; later delays double it.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_once(&self, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => format!("[Failed to read response body: {e}]"),
        };
        Err(NotifyError::Api {
            status: status.as_u16(),
            body: text.chars().take(MAX_BODY_LENGTH).collect(),
        })
    }

    /// Delivers with up to three attempts and exponential backoff.
    pub async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let body = serde_json::to_string(event)?;
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.post_once(&body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        metric = %event.metric_name,
                        error = %e,
                        "Webhook delivery failed"
                    );
                    last_err = Some(e);
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(self.backoff_base * 2u32.pow(attempt)).await;
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, event: &AlertEvent) -> anyhow::Result<()> {
        Ok(self.deliver(event).await?)
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}
