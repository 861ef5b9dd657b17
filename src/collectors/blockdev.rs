//! Physical disk enumeration and power state.
//!
//! Base block devices are listed from /sys/block. SATA/SAS disks are asked for
//! their power state with `hdparm -C`, which does not spin a sleeping disk up.
//! NVMe devices are never queried.

use crate::command::CommandRunner;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const SYS_BLOCK: &str = "/sys/block";

static PSEUDO_DEVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(loop|ram|dm-|md)").expect("valid pseudo device regex"));
static SCSI_DISK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sd[a-z]+$").expect("valid sd regex"));
static NVME_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^nvme\d+n\d+$").expect("valid nvme regex"));
static HDPARM_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"drive state is:\s+(.*)").expect("valid hdparm regex"));

/// Power state of a disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskState {
    Active,
    Standby,
}

/// One physical disk in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskRecord {
    pub name: String,
    pub state: Option<DiskState>,
    /// Temperature probing is disabled; always null.
    #[serde(rename = "temp_C")]
    pub temp_c: Option<f64>,
}

/// Whether `name` is a whole disk we report (`sdX` or `nvmeXnY`).
pub fn is_reported_disk(name: &str) -> bool {
    !PSEUDO_DEVICE.is_match(name) && (SCSI_DISK.is_match(name) || NVME_NAMESPACE.is_match(name))
}

/// Filters device names down to reported disks, sorted by name.
pub fn filter_block_devices<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut devices: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|n| is_reported_disk(n))
        .collect();
    devices.sort();
    devices
}

/// Lists reported disks in a /sys/block style directory. Unreadable => empty.
pub fn list_block_devices_in(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => filter_block_devices(
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned()),
        ),
        Err(e) => {
            debug!("Failed to list {}: {}", dir.display(), e);
            Vec::new()
        }
    }
}

pub fn list_block_devices() -> Vec<String> {
    list_block_devices_in(Path::new(SYS_BLOCK))
}

/// Maps the text after "drive state is:" to a state.
pub fn parse_hdparm_state(output: &str) -> Option<DiskState> {
    let state = HDPARM_STATE
        .captures(output)?
        .get(1)?
        .as_str()
        .trim()
        .to_lowercase();

    if state.contains("standby") || state.contains("sleep") {
        Some(DiskState::Standby)
    } else if state.contains("active") || state.contains("idle") {
        Some(DiskState::Active)
    } else {
        None
    }
}

/// Power state of disk `name`. NVMe is reported active without a query.
pub fn disk_state(name: &str, runner: &dyn CommandRunner) -> Option<DiskState> {
    if name.starts_with("nvme") {
        return Some(DiskState::Active);
    }

    let device = format!("/dev/{}", name);
    let output = runner.run("hdparm", &["-C", &device])?;
    parse_hdparm_state(&output)
}

/// Disk records for `names`, queried fresh.
pub fn read_disks_for(names: &[String], runner: &dyn CommandRunner) -> Vec<DiskRecord> {
    names
        .iter()
        .map(|name| DiskRecord {
            name: name.clone(),
            state: disk_state(name, runner),
            temp_c: None,
        })
        .collect()
}

pub fn read_disks(runner: &dyn CommandRunner) -> Vec<DiskRecord> {
    read_disks_for(&list_block_devices(), runner)
}
