//! Enumerated metric names and the accessor each one reads.
//!
//! Configuration names metrics by string; deserializing into these enums
//! turns an unknown name into a load-time error.

use crate::{DiskIoCounters, SystemSnapshot};
use nodewatch_common::types::LiveProcess;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMetricKind {
    AvgLoad1,
    AvgLoad5,
    AvgLoad15,
    CpuUsage,
    MemoryUsage,
}

impl SystemMetricKind {
    pub fn name(self) -> &'static str {
        match self {
            SystemMetricKind::AvgLoad1 => "avg_load1",
            SystemMetricKind::AvgLoad5 => "avg_load5",
            SystemMetricKind::AvgLoad15 => "avg_load15",
            SystemMetricKind::CpuUsage => "cpu_usage",
            SystemMetricKind::MemoryUsage => "memory_usage",
        }
    }

    pub fn read(self, snapshot: &SystemSnapshot) -> f64 {
        match self {
            SystemMetricKind::AvgLoad1 => snapshot.load1,
            SystemMetricKind::AvgLoad5 => snapshot.load5,
            SystemMetricKind::AvgLoad15 => snapshot.load15,
            SystemMetricKind::CpuUsage => snapshot.cpu_usage,
            SystemMetricKind::MemoryUsage => snapshot.memory_usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskIoMetricKind {
    ReadBytes,
    WriteBytes,
    ReadCount,
    WriteCount,
}

impl DiskIoMetricKind {
    pub fn name(self) -> &'static str {
        match self {
            DiskIoMetricKind::ReadBytes => "read_bytes",
            DiskIoMetricKind::WriteBytes => "write_bytes",
            DiskIoMetricKind::ReadCount => "read_count",
            DiskIoMetricKind::WriteCount => "write_count",
        }
    }

    pub fn read(self, io: &DiskIoCounters) -> u64 {
        match self {
            DiskIoMetricKind::ReadBytes => io.read_bytes,
            DiskIoMetricKind::WriteBytes => io.write_bytes,
            DiskIoMetricKind::ReadCount => io.read_count,
            DiskIoMetricKind::WriteCount => io.write_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMetricKind {
    CpuUsage,
    MemUsage,
    ConnCount,
}

/// A process metric value: percentages are floats, connection counts integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessReading {
    Percent(f64),
    Count(u64),
}

impl ProcessReading {
    fn above(&self, other: &ProcessReading) -> bool {
        match (self, other) {
            (ProcessReading::Percent(a), ProcessReading::Percent(b)) => a > b,
            (ProcessReading::Count(a), ProcessReading::Count(b)) => a > b,
            _ => false,
        }
    }
}

impl ProcessMetricKind {
    pub fn name(self) -> &'static str {
        match self {
            ProcessMetricKind::CpuUsage => "cpu_usage",
            ProcessMetricKind::MemUsage => "mem_usage",
            ProcessMetricKind::ConnCount => "conn_count",
        }
    }

    pub fn read(self, process: &LiveProcess) -> ProcessReading {
        match self {
            ProcessMetricKind::CpuUsage => ProcessReading::Percent(process.cpu_percent),
            ProcessMetricKind::MemUsage => ProcessReading::Percent(process.memory_percent),
            ProcessMetricKind::ConnCount => ProcessReading::Count(process.connection_count),
        }
    }

    /// Highest reading across several processes sharing one name, with the
    /// process it came from.
    pub fn peak<'a>(
        self,
        processes: impl IntoIterator<Item = &'a LiveProcess>,
    ) -> Option<(&'a LiveProcess, ProcessReading)> {
        processes
            .into_iter()
            .map(|p| (p, self.read(p)))
            .reduce(|best, next| if next.1.above(&best.1) { next } else { best })
    }
}
