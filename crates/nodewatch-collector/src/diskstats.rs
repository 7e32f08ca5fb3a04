//! Reader for the kernel's block device counters (`/proc/diskstats`).

use crate::error::{CollectorError, Result};
use crate::DiskIoCounters;
use std::collections::HashMap;
use std::path::Path;

pub const DISKSTATS_PATH: &str = "/proc/diskstats";

/// Sector size the kernel reports counters in, regardless of the device.
const SECTOR_BYTES: u64 = 512;

/// Reads and parses the diskstats file at `path`.
pub fn read_diskstats(path: &Path) -> Result<HashMap<String, DiskIoCounters>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_diskstats(&content))
}

/// Parses diskstats content into counters keyed by device name.
///
/// Lines with fewer than ten columns (pre-2.6.25 partition rows) are skipped.
/// A row with a non-numeric counter is logged and skipped; the other devices
/// keep their counters.
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskIoCounters> {
    let mut out = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        match parse_row(idx + 1, &fields) {
            Ok(counters) => {
                out.insert(fields[2].to_string(), counters);
            }
            Err(e) => tracing::warn!(device = fields[2], error = %e, "Skipping diskstats row"),
        }
    }
    out
}

fn parse_row(line: usize, fields: &[&str]) -> Result<DiskIoCounters> {
    let num = |col: usize| -> Result<u64> {
        fields[col].parse::<u64>().map_err(|e| CollectorError::Parse {
            line,
            reason: format!("column {col} ({}): {e}", fields[col]),
        })
    };
    Ok(DiskIoCounters {
        read_count: num(3)?,
        read_bytes: num(5)?.saturating_mul(SECTOR_BYTES),
        write_count: num(7)?,
        write_bytes: num(9)?.saturating_mul(SECTOR_BYTES),
    })
}

/// Strips a device path down to the kernel name: `/dev/vdb1` -> `vdb1`.
pub fn device_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
