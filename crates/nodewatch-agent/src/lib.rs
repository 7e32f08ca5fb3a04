//! Node-local watchdog for a multi-tenant storage cluster.
//!
//! Three independent poll loops (system, process, tenant) sample the node,
//! evaluate threshold policies through the shared registries and send
//! alerts to the management plane. A small HTTP API exposes the current
//! metric state and the last tenant reconciliation.

pub mod api;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod state;

#[cfg(test)]
mod tests;
