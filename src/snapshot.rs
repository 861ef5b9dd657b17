//! Telemetry snapshot document and its assembly.
//!
//! A [`Snapshot`] is built fresh for every GET. The only state that survives
//! between requests is held by the two rate trackers inside
//! [`SnapshotAssembler`].

use crate::collectors::blockdev::{read_disks, DiskRecord};
use crate::collectors::filesystem::{read_root_filesystem, FilesystemUsage};
use crate::collectors::netdev::{is_virtual_interface, NetRateTracker, NetRates};
use crate::collectors::proxmox::{read_inventory, VirtInventory};
use crate::collectors::route::{read_ip_info, IpInfo};
use crate::command::{CommandRunner, SystemCommands};
use crate::system::{self, CpuUsageTracker, LoadAverage, MemoryInfo};
use serde::Serialize;
use tracing::debug;

pub const SCHEMA_VERSION: u32 = 1;
pub const SCRIPT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hostname reported when the lookup fails.
const UNKNOWN_HOSTNAME: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuBlock {
    pub percent: Option<f64>,
    pub cores: Option<usize>,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

impl CpuBlock {
    pub fn new(percent: Option<f64>, cores: Option<usize>, load: LoadAverage) -> Self {
        Self {
            percent,
            cores,
            load1: load.one_min,
            load5: load.five_min,
            load15: load.fifteen_min,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceRate {
    #[serde(rename = "if")]
    pub ifname: String,
    #[serde(rename = "rx_Bps")]
    pub rx_bytes_per_sec: i64,
    #[serde(rename = "tx_Bps")]
    pub tx_bytes_per_sec: i64,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetBlock {
    pub window_s: f64,
    #[serde(rename = "total_rx_Bps")]
    pub total_rx_bytes_per_sec: i64,
    #[serde(rename = "total_tx_Bps")]
    pub total_tx_bytes_per_sec: i64,
    #[serde(rename = "total_rx_bps")]
    pub total_rx_bits_per_sec: i64,
    #[serde(rename = "total_tx_bps")]
    pub total_tx_bits_per_sec: i64,
    pub interfaces: Vec<InterfaceRate>,
}

impl From<&NetRates> for NetBlock {
    fn from(net: &NetRates) -> Self {
        let total_rx = net.total_rx();
        let total_tx = net.total_tx();

        Self {
            window_s: (net.window_seconds * 1000.0).round() / 1000.0,
            total_rx_bytes_per_sec: total_rx,
            total_tx_bytes_per_sec: total_tx,
            total_rx_bits_per_sec: total_rx.saturating_mul(8),
            total_tx_bits_per_sec: total_tx.saturating_mul(8),
            interfaces: net
                .rates
                .iter()
                .map(|(name, &(rx, tx))| InterfaceRate {
                    ifname: name.clone(),
                    rx_bytes_per_sec: rx,
                    tx_bytes_per_sec: tx,
                    is_virtual: is_virtual_interface(name),
                })
                .collect(),
        }
    }
}

/// One complete telemetry document. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub script_version: String,
    pub timestamp_ms: i64,
    pub hostname: String,
    pub uptime_s: Option<u64>,
    pub cpu: CpuBlock,
    pub ram: MemoryInfo,
    pub filesystems: Vec<FilesystemUsage>,
    pub proxmox: VirtInventory,
    pub disks: Vec<DiskRecord>,
    pub ip: IpInfo,
    pub net: NetBlock,
}

impl Snapshot {
    /// Compact single-line JSON (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Anything that can produce a snapshot on demand.
pub trait SnapshotSource {
    fn snapshot(&mut self) -> Snapshot;
}

/// Local hostname, or "unknown".
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string())
}

/// Owns the CPU and network trackers and runs every reader once per request.
pub struct SnapshotAssembler {
    cpu: CpuUsageTracker,
    net: NetRateTracker,
    runner: Box<dyn CommandRunner + Send>,
}

impl SnapshotAssembler {
    /// Assembler that queries the real OS tools.
    pub fn new() -> Self {
        Self::with_runner(Box::new(SystemCommands))
    }

    pub fn with_runner(runner: Box<dyn CommandRunner + Send>) -> Self {
        Self {
            cpu: CpuUsageTracker::new(),
            net: NetRateTracker::new(),
            runner,
        }
    }

    /// Builds one snapshot. Reader failures surface as nulls, zeros where
    /// documented, or empty lists; this never fails.
    pub fn assemble(&mut self) -> Snapshot {
        let hostname = hostname();
        let cpu_percent = self.cpu.compute();
        let net = self.net.rates();
        let runner = self.runner.as_ref();

        let snapshot = Snapshot {
            schema_version: SCHEMA_VERSION,
            script_version: SCRIPT_VERSION.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            uptime_s: system::read_uptime(),
            cpu: CpuBlock::new(cpu_percent, system::cpu_cores(), system::read_load_average()),
            ram: system::read_memory_info(),
            filesystems: vec![read_root_filesystem()],
            proxmox: read_inventory(runner, &hostname),
            disks: read_disks(runner),
            ip: read_ip_info(runner),
            net: NetBlock::from(&net),
            hostname,
        };

        debug!(
            "Snapshot assembled: cpu={:?} disks={} guests={} interfaces={}",
            snapshot.cpu.percent,
            snapshot.disks.len(),
            snapshot.proxmox.vm_total + snapshot.proxmox.lxc_total,
            snapshot.net.interfaces.len()
        );

        snapshot
    }
}

impl Default for SnapshotAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for SnapshotAssembler {
    fn snapshot(&mut self) -> Snapshot {
        self.assemble()
    }
}
