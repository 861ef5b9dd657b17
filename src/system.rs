//! System-wide metrics collection from /proc filesystem.
//!
//! This module provides the CPU utilisation tracker plus the stateless readers
//! for load average, memory, uptime and core count.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use tracing::debug;

pub const PROC_STAT: &str = "/proc/stat";
pub const PROC_LOADAVG: &str = "/proc/loadavg";
pub const PROC_MEMINFO: &str = "/proc/meminfo";
pub const PROC_UPTIME: &str = "/proc/uptime";

/// System load averages for 1, 5, and 15 minute intervals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

/// RAM and swap usage in bytes. `None` means the value could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub total_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
    pub swap_total_bytes: Option<u64>,
    pub swap_used_bytes: Option<u64>,
}

/// Cumulative CPU time buckets from the aggregate `cpu` line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (user through steal; guest time is already in user).
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Calculate non-active time (idle + iowait).
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Parses the aggregate `cpu` line from the contents of /proc/stat.
///
/// Format: "cpu  user nice system idle iowait irq softirq steal guest guest_nice"
pub fn parse_cpu_stat(content: &str) -> Result<CpuStat, String> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| "No aggregate cpu line found in /proc/stat".to_string())?;

    let values = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|e| format!("Failed to parse cpu line: {}", e))?;

    if values.len() < 4 {
        return Err(format!(
            "Invalid cpu line: expected at least 4 fields, got {}",
            values.len()
        ));
    }

    let field = |idx: usize| values.get(idx).copied().unwrap_or(0);

    Ok(CpuStat {
        user: field(0),
        nice: field(1),
        system: field(2),
        idle: field(3),
        iowait: field(4),
        irq: field(5),
        softirq: field(6),
        steal: field(7),
    })
}

/// Reads the aggregate CPU counters from /proc/stat.
pub fn read_cpu_stat() -> Result<CpuStat, String> {
    let content =
        fs::read_to_string(PROC_STAT).map_err(|e| format!("Failed to read /proc/stat: {}", e))?;
    parse_cpu_stat(&content)
}

/// Keeps exactly one previous CPU sample and turns consecutive samples into
/// a utilisation percentage.
#[derive(Debug, Default)]
pub struct CpuUsageTracker {
    previous: Option<CpuStat>,
}

impl CpuUsageTracker {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Reads /proc/stat and returns the utilisation since the previous call.
    /// A failed read leaves the stored sample untouched.
    pub fn compute(&mut self) -> Option<f64> {
        match read_cpu_stat() {
            Ok(current) => self.observe(current),
            Err(e) => {
                debug!("CPU sample unavailable: {}", e);
                None
            }
        }
    }

    /// Feeds one sample. The first sample, and any sample where total time did
    /// not advance, yields `None`. The stored sample is always replaced.
    pub fn observe(&mut self, current: CpuStat) -> Option<f64> {
        let previous = self.previous.replace(current)?;

        if current.total() <= previous.total() {
            return None;
        }

        let delta_total = (current.total() - previous.total()) as f64;
        let delta_idle = current.idle_total() as f64 - previous.idle_total() as f64;

        let usage = ((1.0 - delta_idle / delta_total) * 100.0).clamp(0.0, 100.0);
        Some((usage * 10.0).round() / 10.0)
    }

    pub fn previous(&self) -> Option<CpuStat> {
        self.previous
    }
}

/// Parses load averages from the contents of /proc/loadavg.
///
/// Format: "0.00 0.01 0.05 1/234 5678"
pub fn parse_load_average(content: &str) -> Result<LoadAverage, String> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "Invalid /proc/loadavg format: expected at least 3 fields, got {}",
            parts.len()
        ));
    }

    let one_min = parts[0]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 1min load average: {}", e))?;
    let five_min = parts[1]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 5min load average: {}", e))?;
    let fifteen_min = parts[2]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 15min load average: {}", e))?;

    Ok(LoadAverage {
        one_min,
        five_min,
        fifteen_min,
    })
}

/// Reads load average from /proc/loadavg, falling back to all zeros.
pub fn read_load_average() -> LoadAverage {
    fs::read_to_string(PROC_LOADAVG)
        .map_err(|e| format!("Failed to read /proc/loadavg: {}", e))
        .and_then(|content| parse_load_average(&content))
        .unwrap_or_else(|e| {
            debug!("{}", e);
            LoadAverage::default()
        })
}

/// Parses /proc/meminfo. Any malformed line fails the whole parse.
///
/// used = MemTotal - (MemFree + Buffers + Cached + SReclaimable)
pub fn parse_memory_info(content: &str) -> Result<MemoryInfo, String> {
    let mut fields: HashMap<&str, u64> = HashMap::new();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let (key, rest) = line
            .split_once(':')
            .ok_or_else(|| format!("Invalid /proc/meminfo line: {}", line))?;
        let kb = rest
            .split_whitespace()
            .next()
            .ok_or_else(|| format!("Missing value for {}", key))?
            .parse::<u64>()
            .map_err(|e| format!("Failed to parse {}: {}", key.trim(), e))?;
        fields.insert(key.trim(), kb * 1024);
    }

    let get = |key: &str| fields.get(key).copied();
    let free = ["MemFree", "Buffers", "Cached", "SReclaimable"]
        .iter()
        .map(|k| get(k).unwrap_or(0))
        .sum::<u64>();

    let total_bytes = get("MemTotal");
    let swap_total_bytes = get("SwapTotal");
    let swap_used = swap_total_bytes
        .unwrap_or(0)
        .saturating_sub(get("SwapFree").unwrap_or(0));

    Ok(MemoryInfo {
        total_bytes,
        used_bytes: total_bytes.map(|t| t.saturating_sub(free)),
        swap_total_bytes,
        swap_used_bytes: Some(swap_used),
    })
}

/// Reads /proc/meminfo; on failure every value is unknown.
pub fn read_memory_info() -> MemoryInfo {
    fs::read_to_string(PROC_MEMINFO)
        .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))
        .and_then(|content| parse_memory_info(&content))
        .unwrap_or_else(|e| {
            debug!("{}", e);
            MemoryInfo::default()
        })
}

/// Parses the first field of /proc/uptime, truncated to whole seconds.
///
/// Format: "<uptime_seconds> <idle_seconds>"
pub fn parse_uptime(content: &str) -> Result<u64, String> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| "Invalid /proc/uptime format: no fields found".to_string())?;

    let seconds = first
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse uptime: {}", e))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("Invalid uptime value: {}", seconds));
    }

    Ok(seconds.trunc() as u64)
}

/// Reads system uptime in seconds from /proc/uptime.
pub fn read_uptime() -> Option<u64> {
    fs::read_to_string(PROC_UPTIME)
        .map_err(|e| format!("Failed to read /proc/uptime: {}", e))
        .and_then(|content| parse_uptime(&content))
        .map_err(|e| debug!("{}", e))
        .ok()
}

/// Number of configured logical CPUs, offline ones included.
pub fn cpu_cores() -> Option<usize> {
    // SAFETY: sysconf has no memory-safety preconditions; -1 signals an error
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
    if n > 0 {
        Some(n as usize)
    } else {
        None
    }
}
