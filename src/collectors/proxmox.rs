//! Proxmox guest inventory.
//!
//! VMs come from `qm list --no-status --full` (or plain `qm list` on hosts
//! that reject those flags), containers from `pct list`. A host without these
//! tools simply has an empty inventory.

use crate::command::CommandRunner;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static PCT_HOSTNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^hostname:\s*(.+)$").expect("valid hostname regex"));

/// Guest type as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    Qemu,
    Lxc,
}

/// One VM or container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestRecord {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub node: String,
    #[serde(rename = "type")]
    pub kind: GuestKind,
}

impl GuestRecord {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// VM and container counts plus the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtInventory {
    pub vm_running: usize,
    pub vm_total: usize,
    pub lxc_running: usize,
    pub lxc_total: usize,
    pub vms: Vec<GuestRecord>,
    pub lxcs: Vec<GuestRecord>,
}

impl VirtInventory {
    /// Builds the inventory, deriving counts from the lists.
    pub fn from_guests(vms: Vec<GuestRecord>, lxcs: Vec<GuestRecord>) -> Self {
        Self {
            vm_running: vms.iter().filter(|g| g.is_running()).count(),
            vm_total: vms.len(),
            lxc_running: lxcs.iter().filter(|g| g.is_running()).count(),
            lxc_total: lxcs.len(),
            vms,
            lxcs,
        }
    }
}

/// Parses a guest listing. Rows need a numeric first column and at least three
/// columns: `id name... status`. Middle tokens form the name.
pub fn parse_guest_list(output: &str, node: &str, kind: GuestKind) -> Vec<GuestRecord> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            let id = parts[0].parse::<u32>().ok()?;
            let name = parts[1..parts.len() - 1].join(" ");
            Some(GuestRecord {
                id,
                name: if name.is_empty() { id.to_string() } else { name },
                status: parts[parts.len() - 1].to_lowercase(),
                node: node.to_string(),
                kind,
            })
        })
        .collect()
}

/// Extracts the `hostname:` value from `pct config` output.
pub fn parse_pct_hostname(config: &str) -> Option<String> {
    PCT_HOSTNAME
        .captures(config)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|h| !h.is_empty())
}

fn read_vms(runner: &dyn CommandRunner, node: &str) -> Vec<GuestRecord> {
    if !runner.exists("qm") {
        return Vec::new();
    }
    runner
        .run("qm", &["list", "--no-status", "--full"])
        .or_else(|| runner.run("qm", &["list"]))
        .map(|out| parse_guest_list(&out, node, GuestKind::Qemu))
        .unwrap_or_default()
}

fn read_containers(runner: &dyn CommandRunner, node: &str) -> Vec<GuestRecord> {
    if !runner.exists("pct") {
        return Vec::new();
    }
    let mut lxcs = runner
        .run("pct", &["list"])
        .map(|out| parse_guest_list(&out, node, GuestKind::Lxc))
        .unwrap_or_default();

    // Containers without a name show their id; prefer the configured hostname
    for lxc in lxcs
        .iter_mut()
        .filter(|c| c.name.chars().all(|ch| ch.is_ascii_digit()))
    {
        let id = lxc.id.to_string();
        if let Some(hostname) = runner
            .run("pct", &["config", &id])
            .as_deref()
            .and_then(parse_pct_hostname)
        {
            lxc.name = hostname;
        }
    }

    lxcs
}

/// Reads VM and container inventory for `node`.
pub fn read_inventory(runner: &dyn CommandRunner, node: &str) -> VirtInventory {
    VirtInventory::from_guests(read_vms(runner, node), read_containers(runner, node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CannedCommands;

    const QM_LIST: &str = "\
      VMID NAME                 STATUS
       100 web-frontend         running
       101 windows build box    STOPPED
       102 db                   running
";

    const PCT_LIST: &str = "\
VMID       Status     Lock         Name
200        running
201        vpn        running
";

    #[test]
    fn test_parse_guest_list() {
        let vms = parse_guest_list(QM_LIST, "pve1", GuestKind::Qemu);
        assert_eq!(vms.len(), 3);
        assert_eq!(vms[0].id, 100);
        assert_eq!(vms[0].name, "web-frontend");
        assert_eq!(vms[1].name, "windows build box");
        assert_eq!(vms[1].status, "stopped");
        assert!(vms.iter().all(|v| v.node == "pve1" && v.kind == GuestKind::Qemu));
    }

    #[test]
    fn test_short_rows_and_headers_skipped() {
        let guests = parse_guest_list("VMID NAME STATUS\n300 running\n\n", "n", GuestKind::Lxc);
        assert!(guests.is_empty());
    }

    #[test]
    fn test_parse_pct_hostname() {
        let config = "arch: amd64\ncores: 2\nHostname: pihole\nmemory: 512\n";
        assert_eq!(parse_pct_hostname(config).as_deref(), Some("pihole"));
        assert_eq!(parse_pct_hostname("arch: amd64\n"), None);
    }

    #[test]
    fn test_inventory_counts() {
        let runner = CannedCommands::new()
            .with_output("qm list", QM_LIST)
            .with_output("pct list", PCT_LIST);
        let inv = read_inventory(&runner, "pve1");
        assert_eq!(inv.vm_total, 3);
        assert_eq!(inv.vm_running, 2);
        assert_eq!(inv.lxc_total, 1);
        assert_eq!(inv.lxc_running, 1);
        assert_eq!(inv.lxcs[0].name, "vpn");
    }

    #[test]
    fn test_numeric_container_name_uses_hostname() {
        let runner = CannedCommands::new()
            .with_output("pct list", "VMID Status Name\n205 4242 running\n206 7 stopped\n")
            .with_output("pct config 205", "arch: amd64\nhostname: media\n");
        let inv = read_inventory(&runner, "pve1");
        assert_eq!(inv.lxcs[0].name, "media");
        // Lookup failed: keep the listed name
        assert_eq!(inv.lxcs[1].name, "7");
        assert!(!runner.calls().iter().any(|c| c.starts_with("qm")));
    }

    #[test]
    fn test_qm_full_listing_preferred() {
        let runner = CannedCommands::new()
            .with_output("qm list --no-status --full", "100 web-frontend running\n")
            .with_output("qm list", QM_LIST);
        let inv = read_inventory(&runner, "pve1");
        assert_eq!(inv.vm_total, 1);
        assert_eq!(runner.calls(), vec!["qm list --no-status --full".to_string()]);
    }

    #[test]
    fn test_qm_falls_back_to_plain_listing() {
        let runner = CannedCommands::new().with_output("qm list", QM_LIST);
        let inv = read_inventory(&runner, "pve1");
        assert_eq!(inv.vm_total, 3);
        assert_eq!(
            runner.calls(),
            vec!["qm list --no-status --full".to_string(), "qm list".to_string()]
        );
    }

    #[test]
    fn test_missing_tools_give_empty_inventory() {
        let inv = read_inventory(&CannedCommands::new(), "pve1");
        assert_eq!(inv, VirtInventory::default());
    }

    #[test]
    fn test_inventory_serialization_uses_type_key() {
        let inv = VirtInventory::from_guests(
            vec![GuestRecord {
                id: 100,
                name: "web".into(),
                status: "running".into(),
                node: "pve1".into(),
                kind: GuestKind::Qemu,
            }],
            Vec::new(),
        );
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(json["vm_running"], 1);
        assert_eq!(json["vms"][0]["type"], "qemu");
        assert_eq!(json["lxcs"].as_array().unwrap().len(), 0);
    }
}
