//! Tenant identity reconciliation.
//!
//! Three sources describe the tenants on a node and none of them is
//! authoritative about the others: the tenant directory (what the control
//! plane assigned), the local supervisor (what the node thinks it runs) and
//! the live process table (what actually runs). [`reconcile::reconcile`]
//! joins them and classifies every mismatch.
//!
//! The directory and supervisor collaborators are behind the
//! [`TenantDirectory`] and [`SupervisorSource`] traits so the poll loop can
//! be driven by fakes in tests.

pub mod directory;
pub mod error;
pub mod reconcile;
pub mod supervisor;


use anyhow::Result;
use async_trait::async_trait;
use nodewatch_common::types::{SupervisorRecord, TenantIdentity};

/// Source of the tenants assigned to this node.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Returns the directory's current tenant list for `node_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unreachable or its response
    /// cannot be decoded.
    async fn fetch_tenants(&self, node_id: &str) -> Result<Vec<TenantIdentity>>;
}

/// Source of the local supervisor's per-tenant records.
#[async_trait]
pub trait SupervisorSource: Send + Sync {
    /// Returns one record per tenant the supervisor knows about.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be listed at all. Individual
    /// malformed records are skipped rather than failing the whole fetch.
    async fn fetch_records(&self) -> Result<Vec<SupervisorRecord>>;
}
