use crate::diskstats::{device_name, read_diskstats, DISKSTATS_PATH};
use crate::error::CollectorError;
use crate::{DiskIoCounters, DiskSample, SystemSnapshot, SystemStatsSource};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use sysinfo::{Disks, System};

/// [`SystemStatsSource`] backed by `sysinfo` and `/proc/diskstats`.
pub struct SysinfoStats {
    system: System,
    disks: Disks,
    mounts: Vec<String>,
    diskstats_path: PathBuf,
}

impl SysinfoStats {
    /// `mounts` are the mount points to report, e.g. `["/", "/data1"]`.
    pub fn new(mounts: Vec<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            mounts,
            diskstats_path: PathBuf::from(DISKSTATS_PATH),
        }
    }

    fn disk_sample(
        &self,
        mount: &str,
        io: &HashMap<String, DiskIoCounters>,
    ) -> std::result::Result<DiskSample, CollectorError> {
        let disk = self
            .disks
            .iter()
            .find(|d| d.mount_point().to_string_lossy() == mount)
            .ok_or_else(|| CollectorError::UnknownDisk(mount.to_string()))?;

        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        let usage_percent = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let device_path = disk.name().to_string_lossy();
        let device = device_name(&device_path).to_string();

        Ok(DiskSample {
            mount: mount.to_string(),
            io: io.get(&device).copied(),
            device,
            usage_percent,
        })
    }
}

impl SystemStatsSource for SysinfoStats {
    fn sample(&mut self) -> Result<SystemSnapshot> {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.disks.refresh();

        let total = self.system.total_memory();
        let memory_usage = if total > 0 {
            (self.system.used_memory() as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let load = System::load_average();

        let io = match read_diskstats(&self.diskstats_path) {
            Ok(io) => io,
            Err(e) => {
                tracing::warn!(error = %e, "Disk I/O counters unavailable");
                HashMap::new()
            }
        };

        let mut disks = Vec::with_capacity(self.mounts.len());
        for mount in &self.mounts {
            match self.disk_sample(mount, &io) {
                Ok(sample) => disks.push(sample),
                Err(e) => tracing::warn!(mount = %mount, error = %e, "Skipping disk"),
            }
        }

        Ok(SystemSnapshot {
            cpu_usage: self.system.global_cpu_usage() as f64,
            memory_usage,
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
            disks,
        })
    }
}
