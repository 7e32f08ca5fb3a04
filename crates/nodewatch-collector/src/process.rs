use crate::ProcessTable;
use anyhow::Result;
use nodewatch_common::types::LiveProcess;
use std::path::Path;
use sysinfo::System;

/// [`ProcessTable`] backed by `sysinfo`, with open sockets counted from
/// `/proc/<pid>/fd`.
pub struct SysinfoProcessTable {
    system: System,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn snapshot(&mut self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<LiveProcess>> {
        self.system.refresh_all();
        let total_memory = self.system.total_memory();

        let mut out = Vec::new();
        for (pid, process) in self.system.processes() {
            let name = process.name().to_string_lossy();
            if !filter(&*name) {
                continue;
            }
            let memory_percent = if total_memory > 0 {
                (process.memory() as f64 / total_memory as f64) * 100.0
            } else {
                0.0
            };
            let pid = pid.as_u32();
            let fd_dir = Path::new("/proc").join(pid.to_string()).join("fd");
            out.push(LiveProcess {
                process_id: pid,
                name: name.into_owned(),
                cpu_percent: process.cpu_usage() as f64,
                memory_percent,
                connection_count: count_socket_links(&fd_dir),
            });
        }
        tracing::debug!(count = out.len(), "Process table sampled");
        Ok(out)
    }
}

/// Counts entries of a process fd directory that link to a socket.
/// An unreadable directory (process gone, no permission) counts as zero.
pub fn count_socket_links(fd_dir: &Path) -> u64 {
    let entries = match std::fs::read_dir(fd_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %fd_dir.display(), error = %e, "Cannot list descriptors");
            return 0;
        }
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|target| target.to_string_lossy().starts_with("socket:"))
        .count() as u64
}
