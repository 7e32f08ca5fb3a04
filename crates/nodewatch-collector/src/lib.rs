//! Stat sources for the nodewatch agent.
//!
//! [`SystemStatsSource`] samples host-wide values (cpu, memory, load and the
//! monitored mounts), [`ProcessTable`] enumerates live processes. Both are
//! plain synchronous traits so the poll loops can swap in fakes.

pub mod diskstats;
pub mod error;
pub mod kinds;
pub mod process;
pub mod system;


use anyhow::Result;
use nodewatch_common::types::LiveProcess;
use serde::Serialize;

/// Cumulative block device counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskIoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_count: u64,
    pub write_count: u64,
}

/// One monitored mount point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskSample {
    pub mount: String,
    /// Kernel device name, e.g. `vdb1`.
    pub device: String,
    pub usage_percent: f64,
    /// `None` when the device has no entry in the kernel's I/O statistics.
    pub io: Option<DiskIoCounters>,
}

/// Host-wide values gathered in one sampling pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub disks: Vec<DiskSample>,
}

/// Source of host-wide statistics.
pub trait SystemStatsSource: Send {
    /// Samples cpu, memory, load and every monitored mount.
    ///
    /// # Errors
    ///
    /// Returns an error only when nothing could be sampled. A single mount
    /// that cannot be read is logged and left out of the snapshot.
    fn sample(&mut self) -> Result<SystemSnapshot>;
}

/// The OS process table.
pub trait ProcessTable: Send {
    /// Returns every live process whose name satisfies `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be enumerated.
    fn snapshot(&mut self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<LiveProcess>>;
}

/// Shell-style match of a configured process name pattern (`minio*`,
/// `nginx`) against a live process name.
pub fn name_matches(pattern: &str, name: &str) -> bool {
    glob_match::glob_match(pattern, name)
}
