use crate::error::{Result, TenantError};
use crate::SupervisorSource;
use async_trait::async_trait;
use nodewatch_common::types::SupervisorRecord;
use std::path::{Path, PathBuf};

/// Reads supervisor records from the node controller's running-process
/// directory: one `<anything>.info` JSON file per tenant.
pub struct InfoDirSupervisor {
    dir: PathBuf,
}

impl InfoDirSupervisor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_all(&self) -> Result<Vec<SupervisorRecord>> {
        let io_err = |source| TenantError::SupervisorIo {
            path: self.dir.display().to_string(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("info") {
                continue;
            }
            match read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable supervisor record");
                }
            }
        }
        Ok(records)
    }
}

async fn read_record(path: &Path) -> anyhow::Result<SupervisorRecord> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl SupervisorSource for InfoDirSupervisor {
    async fn fetch_records(&self) -> anyhow::Result<Vec<SupervisorRecord>> {
        Ok(self.read_all().await?)
    }
}
