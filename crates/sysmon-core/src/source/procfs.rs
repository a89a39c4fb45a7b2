//! Linux metric source backed by procfs, sysfs and statvfs(3).

use super::{MetricSource, NetCounters, Partition, PartitionUsage, SwapMemory, VirtualMemory};
use crate::{Error, Result};
use std::collections::HashSet;
use std::ffi::CString;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_MOUNTS: &str = "/proc/mounts";
const PROC_FILESYSTEMS: &str = "/proc/filesystems";
const PROC_CPUINFO: &str = "/proc/cpuinfo";
const SYS_CPU: &str = "/sys/devices/system/cpu";
const SYS_NET: &str = "/sys/class/net";

/// Metric source reading the Linux pseudo-filesystems.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsSource;

impl ProcfsSource {
    /// Creates a new procfs source.
    pub fn new() -> Self {
        Self
    }

    fn read(path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        fs::read_to_string(path).map_err(|e| Error::io(path, e))
    }

    fn read_cpu_times() -> Result<CpuTimes> {
        let content = Self::read(PROC_STAT)?;
        parse_cpu_times(&content).ok_or_else(|| Error::parse(PROC_STAT, "no aggregate cpu line"))
    }

    /// Reads cpuinfo_max_freq (kHz) of every CPU and returns the highest, in MHz.
    fn sysfs_max_frequency() -> Option<f64> {
        let entries = fs::read_dir(SYS_CPU).ok()?;
        entries
            .flatten()
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.strip_prefix("cpu")
                    .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            })
            .filter_map(|entry| {
                let path = entry.path().join("cpufreq/cpuinfo_max_freq");
                fs::read_to_string(path).ok()?.trim().parse::<u64>().ok()
            })
            .max()
            .map(|khz| khz as f64 / 1000.0)
    }

    /// Lists interfaces that expose byte counters, skipping loopback and
    /// virtual container links.
    fn list_interfaces() -> Vec<String> {
        let mut interfaces = Vec::new();
        if let Ok(entries) = fs::read_dir(SYS_NET) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if name == "lo" || name.starts_with("veth") || name.starts_with("docker") {
                    continue;
                }
                let stats_path = format!("{}/{}/statistics/rx_bytes", SYS_NET, name);
                if fs::metadata(&stats_path).is_ok() {
                    interfaces.push(name);
                }
            }
        }
        interfaces.sort();
        interfaces
    }

    fn read_counter(interface: &str, counter: &str) -> Result<u64> {
        let path = format!("{}/{}/statistics/{}", SYS_NET, interface, counter);
        let content = Self::read(&path)?;
        content
            .trim()
            .parse()
            .map_err(|_| Error::parse(&path, format!("not a counter: {:?}", content.trim())))
    }
}

impl MetricSource for ProcfsSource {
    fn cpu_percent(&self, window: Duration) -> Result<f64> {
        let before = Self::read_cpu_times()?;
        std::thread::sleep(window);
        let after = Self::read_cpu_times()?;
        Ok(before.busy_percent_until(&after))
    }

    fn cpu_max_frequency(&self) -> Result<f64> {
        if let Some(mhz) = Self::sysfs_max_frequency() {
            return Ok(mhz);
        }
        debug!("cpufreq unavailable, falling back to {}", PROC_CPUINFO);
        let content = Self::read(PROC_CPUINFO)?;
        parse_cpuinfo_mhz(&content).ok_or(Error::MissingField {
            path: PROC_CPUINFO.into(),
            field: "cpu MHz",
        })
    }

    fn virtual_memory(&self) -> Result<VirtualMemory> {
        let content = Self::read(PROC_MEMINFO)?;
        Ok(VirtualMemory {
            total: meminfo_field(&content, "MemTotal")?,
            available: meminfo_field(&content, "MemAvailable")?,
        })
    }

    fn swap_memory(&self) -> Result<SwapMemory> {
        let content = Self::read(PROC_MEMINFO)?;
        Ok(SwapMemory {
            total: meminfo_field(&content, "SwapTotal")?,
            free: meminfo_field(&content, "SwapFree")?,
        })
    }

    fn partitions(&self) -> Result<Vec<Partition>> {
        let mounts = Self::read(PROC_MOUNTS)?;
        let mut partitions = parse_mounts(&mounts);

        // Drop filesystems the kernel marks as nodev. If the list is
        // unavailable every mount is returned.
        if let Ok(filesystems) = Self::read(PROC_FILESYSTEMS) {
            let nodev = parse_nodev_filesystems(&filesystems);
            partitions.retain(|p| !nodev.contains(p.fs_type.as_str()));
        }

        Ok(partitions)
    }

    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage> {
        statvfs(&partition.mount_point)
    }

    fn net_counters(&self) -> Result<NetCounters> {
        let interfaces = Self::list_interfaces();
        if interfaces.is_empty() {
            return Err(Error::NoInterfaces);
        }

        sum_interface_counters(&interfaces, Self::read_counter)
    }
}

/// Sums rx/tx counters over `interfaces`.
///
/// An interface whose counters cannot be read (it may have gone away since
/// it was listed) is skipped. Fails only when no interface could be read.
fn sum_interface_counters<F>(interfaces: &[String], mut read: F) -> Result<NetCounters>
where
    F: FnMut(&str, &str) -> Result<u64>,
{
    let mut counters = NetCounters::default();
    let mut first_error = None;
    let mut read_any = false;

    for interface in interfaces {
        let pair = read(interface, "rx_bytes")
            .and_then(|rx| Ok((rx, read(interface, "tx_bytes")?)));
        match pair {
            Ok((rx, tx)) => {
                counters.bytes_recv = counters.bytes_recv.saturating_add(rx);
                counters.bytes_sent = counters.bytes_sent.saturating_add(tx);
                read_any = true;
            }
            Err(e) => {
                warn!("Skipping interface {}: {}", interface, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if !read_any => Err(e),
        _ => Ok(counters),
    }
}

/// Aggregate jiffies from the first line of /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

impl CpuTimes {
    fn busy_percent_until(&self, later: &CpuTimes) -> f64 {
        let idle_delta = later.idle.saturating_sub(self.idle);
        let total_delta = later.total.saturating_sub(self.total);
        if total_delta == 0 {
            return 0.0;
        }
        let busy = 1.0 - (idle_delta as f64 / total_delta as f64);
        (100.0 * busy).clamp(0.0, 100.0)
    }
}

/// Parses the aggregate "cpu" line. Idle time includes iowait when present.
fn parse_cpu_times(content: &str) -> Option<CpuTimes> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let parts: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|s| s.parse().ok())
        .collect();

    if parts.len() < 4 {
        return None;
    }
    // guest and guest_nice are already counted in user and nice
    let counted = &parts[..parts.len().min(8)];
    let idle = parts[3] + parts.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        idle,
        total: counted.iter().sum(),
    })
}

fn parse_cpuinfo_mhz(content: &str) -> Option<f64> {
    content
        .lines()
        .filter(|line| line.starts_with("cpu MHz"))
        .filter_map(|line| line.split(':').nth(1)?.trim().parse::<f64>().ok())
        .fold(None, |max: Option<f64>, mhz| Some(max.map_or(mhz, |m| m.max(mhz))))
}

/// Returns a /proc/meminfo field converted from kB to bytes.
fn meminfo_field(content: &str, field: &'static str) -> Result<u64> {
    for line in content.lines() {
        let Some(rest) = line.strip_prefix(field) else {
            continue;
        };
        let Some(value) = rest.strip_prefix(':') else {
            continue;
        };
        let kb: u64 = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::parse(PROC_MEMINFO, format!("bad value for {}", field)))?;
        return Ok(kb * 1024);
    }
    Err(Error::MissingField {
        path: PROC_MEMINFO.into(),
        field,
    })
}

fn parse_mounts(content: &str) -> Vec<Partition> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(Partition::new(
                &unescape_mount_field(device),
                &unescape_mount_field(mount_point),
                fs_type,
            ))
        })
        .collect()
}

/// Decodes the octal escapes (`\040` for space etc.) used in /proc/mounts.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let octal = std::str::from_utf8(&bytes[i + 1..i + 4]).ok();
            if let Some(value) = octal.and_then(|o| u8::from_str_radix(o, 8).ok()) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_nodev_filesystems(content: &str) -> HashSet<&str> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nodev"), Some(fs_type)) => Some(fs_type),
                _ => None,
            }
        })
        .collect()
}

fn statvfs(mount_point: &str) -> Result<PartitionUsage> {
    let path = CString::new(mount_point)
        .map_err(|_| Error::parse(mount_point, "mount point contains a NUL byte"))?;

    // SAFETY: statvfs only writes into the zeroed struct we own, and `path`
    // is a valid NUL-terminated string for the duration of the call.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(Error::Statvfs {
            mount_point: mount_point.to_string(),
            source: std::io::Error::last_os_error(),
        });
    }

    let fragment = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * fragment;
    let free = stat.f_bfree as u64 * fragment;
    Ok(PartitionUsage {
        total,
        used: total.saturating_sub(free),
    })
}
