//! Default route and IPv4 address collector.
//!
//! Uses `ip -4 route show default` for the gateway and egress interface and
//! `ip -4 -o addr show` for the address list.

use crate::command::CommandRunner;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static DEFAULT_ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"default via ([0-9.]+) dev (\S+)").expect("valid default route regex")
});

/// Constant on the wire; a failed lookup shows up as null route fields.
pub const IP_STATUS_OK: &str = "ok";

/// One interface address in CIDR notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceAddr {
    #[serde(rename = "if")]
    pub ifname: String,
    pub addr: String,
}

/// Routing summary for the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpInfo {
    pub primary_ifname: Option<String>,
    pub primary_ipv4: Option<String>,
    pub gateway_ipv4: Option<String>,
    /// Not collected; always null.
    pub route_metric: Option<u32>,
    pub ip_status: String,
    pub ipv4_addrs: Vec<InterfaceAddr>,
}

/// Extracts (gateway, egress interface) from the first default route line.
pub fn parse_default_route(output: &str) -> Option<(String, String)> {
    let first = output.lines().next()?;
    let caps = DEFAULT_ROUTE.captures(first)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Parses `ip -4 -o addr show`: column 2 is the interface, column 4 the CIDR.
///
/// Format: "2: eth0    inet 192.168.1.10/24 brd 192.168.1.255 scope global eth0 ..."
pub fn parse_addr_list(output: &str) -> Vec<InterfaceAddr> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            Some(InterfaceAddr {
                ifname: cols[1].trim_end_matches(':').to_string(),
                addr: cols[3].to_string(),
            })
        })
        .collect()
}

/// Combines route and address data; the primary address is the first one on
/// the default route's interface.
pub fn build_ip_info(route: Option<&str>, addrs: Option<&str>) -> IpInfo {
    let default_route = route.and_then(parse_default_route);
    let ipv4_addrs = addrs.map(parse_addr_list).unwrap_or_default();

    let (gateway_ipv4, primary_ifname) = match default_route {
        Some((gw, dev)) => (Some(gw), Some(dev)),
        None => (None, None),
    };

    let primary_ipv4 = primary_ifname.as_deref().and_then(|dev| {
        ipv4_addrs
            .iter()
            .find(|a| a.ifname == dev)
            .map(|a| a.addr.clone())
    });

    IpInfo {
        primary_ifname,
        primary_ipv4,
        gateway_ipv4,
        route_metric: None,
        ip_status: IP_STATUS_OK.to_string(),
        ipv4_addrs,
    }
}

/// Queries the routing table and interface addresses.
pub fn read_ip_info(runner: &dyn CommandRunner) -> IpInfo {
    let route = runner.run("ip", &["-4", "route", "show", "default"]);
    let addrs = runner.run("ip", &["-4", "-o", "addr", "show"]);
    build_ip_info(route.as_deref(), addrs.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CannedCommands;

    const ROUTE: &str = "default via 192.168.1.1 dev vmbr0 proto kernel onlink\n\
                         default via 10.0.0.1 dev wlan0 metric 600\n";

    const ADDRS: &str = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
4: vmbr0    inet 192.168.1.20/24 brd 192.168.1.255 scope global vmbr0\\       valid_lft forever
5: wlan0    inet 10.0.0.7/24 brd 10.0.0.255 scope global dynamic wlan0
";

    #[test]
    fn test_parse_default_route_uses_first_line() {
        assert_eq!(
            parse_default_route(ROUTE),
            Some(("192.168.1.1".to_string(), "vmbr0".to_string()))
        );
        assert_eq!(parse_default_route(""), None);
        assert_eq!(parse_default_route("default dev wg0 scope link"), None);
    }

    #[test]
    fn test_parse_addr_list() {
        let addrs = parse_addr_list(ADDRS);
        assert_eq!(addrs.len(), 3);
        assert_eq!(addrs[0].ifname, "lo");
        assert_eq!(addrs[1].addr, "192.168.1.20/24");
    }

    #[test]
    fn test_read_ip_info() {
        let runner = CannedCommands::new()
            .with_output("ip -4 route show default", ROUTE)
            .with_output("ip -4 -o addr show", ADDRS);
        let info = read_ip_info(&runner);
        assert_eq!(info.primary_ifname.as_deref(), Some("vmbr0"));
        assert_eq!(info.primary_ipv4.as_deref(), Some("192.168.1.20/24"));
        assert_eq!(info.gateway_ipv4.as_deref(), Some("192.168.1.1"));
        assert_eq!(info.route_metric, None);
        assert_eq!(info.ip_status, "ok");
        assert_eq!(info.ipv4_addrs.len(), 3);
    }

    #[test]
    fn test_route_without_matching_address() {
        let info = build_ip_info(Some("default via 10.1.1.1 dev eth9"), Some(ADDRS));
        assert_eq!(info.primary_ifname.as_deref(), Some("eth9"));
        assert_eq!(info.primary_ipv4, None);
    }

    #[test]
    fn test_command_failure() {
        let info = read_ip_info(&CannedCommands::new());
        assert_eq!(info.primary_ifname, None);
        assert_eq!(info.primary_ipv4, None);
        assert_eq!(info.gateway_ipv4, None);
        assert_eq!(info.ip_status, "ok");
        assert!(info.ipv4_addrs.is_empty());
    }

    #[test]
    fn test_serialization_uses_if_key() {
        let addr = InterfaceAddr {
            ifname: "eth0".into(),
            addr: "10.0.0.2/24".into(),
        };
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            r#"{"if":"eth0","addr":"10.0.0.2/24"}"#
        );
    }
}
