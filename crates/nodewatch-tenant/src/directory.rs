use crate::error::{Result, TenantError};
use crate::TenantDirectory;
use async_trait::async_trait;
use nodewatch_common::types::TenantIdentity;
use serde::Deserialize;
use std::time::Duration;

/// Response envelope of the tenant list API. Only the tenant list is used;
/// the healing and pool settings that ride along are ignored.
#[derive(Debug, Deserialize)]
struct TenantListResponse {
    #[serde(default)]
    region_name: String,
    #[serde(rename = "TenantList", default)]
    tenant_list: Option<Vec<TenantIdentity>>,
}

/// Tenant directory reached over HTTP.
pub struct HttpTenantDirectory {
    client: reqwest::Client,
    url: String,
}

impl HttpTenantDirectory {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn request(&self, node_id: &str) -> Result<Vec<TenantIdentity>> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "NodeId": node_id }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(TenantError::DirectoryStatus {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }
        parse_tenant_list(&body)
    }
}

#[async_trait]
impl TenantDirectory for HttpTenantDirectory {
    async fn fetch_tenants(&self, node_id: &str) -> anyhow::Result<Vec<TenantIdentity>> {
        Ok(self.request(node_id).await?)
    }
}

/// Decodes a tenant list response body. A missing or null list is an empty
/// assignment, not an error.
pub fn parse_tenant_list(body: &str) -> Result<Vec<TenantIdentity>> {
    let resp: TenantListResponse = serde_json::from_str(body)?;
    let tenants = resp.tenant_list.unwrap_or_default();
    tracing::debug!(region = %resp.region_name, count = tenants.len(), "Tenant list decoded");
    Ok(tenants)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
