//! Startup requirement probes for hl-hostmon.
//!
//! Nothing here is fatal: a missing source only means the matching snapshot
//! fields come back null, zero or empty. The probes exist so the journal says
//! why before the first GET arrives.

use crate::collectors::blockdev::SYS_BLOCK;
use crate::collectors::netdev::PROC_NET_DEV;
use crate::command::CommandRunner;
use crate::system::{PROC_MEMINFO, PROC_STAT};
use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Kernel sources every snapshot reads.
pub const REQUIRED_SOURCES: [&str; 4] = [PROC_STAT, PROC_NET_DEV, PROC_MEMINFO, SYS_BLOCK];

/// External tools, with the snapshot fields that depend on them.
pub const OPTIONAL_TOOLS: [(&str, &str); 4] = [
    ("hdparm", "disks[].state"),
    ("ip", "ip"),
    ("qm", "proxmox.vms"),
    ("pct", "proxmox.lxcs"),
];

/// Result of a startup probe run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub missing_sources: Vec<String>,
    pub missing_tools: Vec<String>,
}

impl StartupReport {
    pub fn is_complete(&self) -> bool {
        self.missing_sources.is_empty() && self.missing_tools.is_empty()
    }
}

/// Probe all requirements and log the outcome.
pub fn validate_requirements(runner: &dyn CommandRunner) -> StartupReport {
    info!("Validating runtime requirements...");

    check_privileges();

    let report = StartupReport {
        missing_sources: check_sources(&REQUIRED_SOURCES),
        missing_tools: check_tools(runner, &OPTIONAL_TOOLS),
    };

    if report.is_complete() {
        info!("All runtime requirements available");
    } else {
        warn!(
            "Running degraded: {} source(s) and {} tool(s) unavailable",
            report.missing_sources.len(),
            report.missing_tools.len()
        );
    }
    report
}

/// hdparm needs raw device access.
fn check_privileges() {
    if geteuid().is_root() {
        debug!("Running as root (uid=0)");
    } else {
        warn!("Not running as root - disk power states may be unavailable");
    }
}

/// Returns the sources that cannot be accessed.
pub fn check_sources(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .filter(|path| match fs::metadata(Path::new(path)) {
            Ok(_) => {
                debug!("{} accessible", path);
                false
            }
            Err(e) => {
                warn!("Cannot access {}: {}", path, e);
                true
            }
        })
        .map(|path| path.to_string())
        .collect()
}

/// Returns the tools not found on `PATH`.
pub fn check_tools(runner: &dyn CommandRunner, tools: &[(&str, &str)]) -> Vec<String> {
    tools
        .iter()
        .filter(|(tool, fields)| {
            if runner.exists(tool) {
                debug!("Found {}", tool);
                false
            } else {
                info!("{} not found - {} will be empty", tool, fields);
                true
            }
        })
        .map(|(tool, _)| tool.to_string())
        .collect()
}
