//! Network interface throughput.
//!
//! This module reads cumulative byte counters from /proc/net/dev and keeps the
//! previous reading so consecutive polls can be turned into byte rates.

use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;
use tracing::debug;

pub const PROC_NET_DEV: &str = "/proc/net/dev";

/// Window reported before any interval has been measured.
pub const FIRST_SAMPLE_WINDOW_SECONDS: f64 = 1.0;

/// Smallest interval used as a divisor, guards against clock jitter.
const MIN_WINDOW_SECONDS: f64 = 0.001;

const LOOPBACK: &str = "lo";
const VIRTUAL_PREFIXES: [&str; 4] = ["veth", "tap", "fw", "vmbr"];

/// Cumulative (rx_bytes, tx_bytes) per interface.
pub type NetCounters = HashMap<String, (u64, u64)>;

/// Result of one rate computation. Interfaces are ordered by name.
#[derive(Debug, Clone, PartialEq)]
pub struct NetRates {
    pub window_seconds: f64,
    /// interface -> (rx bytes/s, tx bytes/s)
    pub rates: BTreeMap<String, (i64, i64)>,
}

impl NetRates {
    pub fn total_rx(&self) -> i64 {
        self.rates.values().map(|(rx, _)| rx).sum()
    }

    pub fn total_tx(&self) -> i64 {
        self.rates.values().map(|(_, tx)| tx).sum()
    }
}

/// Parses /proc/net/dev. Header lines and malformed lines are skipped.
///
/// Format: "  eth0: rx_bytes rx_packets ... (8 rx columns) tx_bytes tx_packets ..."
pub fn parse_netdev_counters(content: &str) -> NetCounters {
    let mut counters = NetCounters::new();

    // Skip the first two header lines
    for line in content.lines().skip(2) {
        let Some((interface, stats_str)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = stats_str.split_whitespace().collect();
        if values.len() < 9 {
            continue;
        }

        let (Ok(rx), Ok(tx)) = (values[0].parse::<u64>(), values[8].parse::<u64>()) else {
            continue;
        };

        counters.insert(interface.trim().to_string(), (rx, tx));
    }

    counters
}

/// Reads interface byte counters from /proc/net/dev.
pub fn read_netdev_counters() -> Result<NetCounters, String> {
    let content = fs::read_to_string(PROC_NET_DEV)
        .map_err(|e| format!("Failed to read /proc/net/dev: {}", e))?;
    Ok(parse_netdev_counters(&content))
}

/// Loopback and bridge/tunnel/veth style names are flagged as virtual.
pub fn is_virtual_interface(name: &str) -> bool {
    name == LOOPBACK || VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Holds the previous counter reading and its timestamp (one for the whole map).
#[derive(Debug, Default)]
pub struct NetRateTracker {
    previous: Option<(NetCounters, Instant)>,
}

impl NetRateTracker {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Reads /proc/net/dev and returns rates since the previous call.
    /// A failed read reports no interfaces and keeps the stored reading.
    pub fn rates(&mut self) -> NetRates {
        match read_netdev_counters() {
            Ok(current) => self.observe(current, Instant::now()),
            Err(e) => {
                debug!("Network counters unavailable: {}", e);
                NetRates {
                    window_seconds: FIRST_SAMPLE_WINDOW_SECONDS,
                    rates: BTreeMap::new(),
                }
            }
        }
    }

    /// Feeds one reading taken at `now`. The first reading reports every
    /// interface at zero with the sentinel window; later readings divide the
    /// counter deltas by the elapsed time. Interfaces not seen before count
    /// from their current value.
    pub fn observe(&mut self, current: NetCounters, now: Instant) -> NetRates {
        let (window_seconds, rates) = match self.previous.as_ref() {
            None => (
                FIRST_SAMPLE_WINDOW_SECONDS,
                current.keys().map(|k| (k.clone(), (0, 0))).collect(),
            ),
            Some((previous, previous_at)) => {
                let dt = now
                    .saturating_duration_since(*previous_at)
                    .as_secs_f64()
                    .max(MIN_WINDOW_SECONDS);

                let rates = current
                    .iter()
                    .map(|(name, &(rx, tx))| {
                        let (prev_rx, prev_tx) = previous.get(name).copied().unwrap_or((rx, tx));
                        (
                            name.clone(),
                            (byte_rate(rx, prev_rx, dt), byte_rate(tx, prev_tx, dt)),
                        )
                    })
                    .collect();
                (dt, rates)
            }
        };

        self.previous = Some((current, now));

        NetRates {
            window_seconds,
            rates,
        }
    }
}

/// Bytes per second, truncated toward zero. Counter resets go negative.
fn byte_rate(current: u64, previous: u64, dt: f64) -> i64 {
    ((current as i128 - previous as i128) as f64 / dt) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000       10    0    0    0     0          0         0     1000       10    0    0    0     0       0          0
  eth0: 3000       20    0    0    0     0          0         0     2600       15    0    0    0     0       0          0
 vmbr0 broken line
  tap1: x 1 2
";

    fn counters(entries: &[(&str, u64, u64)]) -> NetCounters {
        entries
            .iter()
            .map(|(n, rx, tx)| (n.to_string(), (*rx, *tx)))
            .collect()
    }

    #[test]
    fn test_parse_netdev_counters() {
        let parsed = parse_netdev_counters(NET_DEV);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("lo"), Some(&(1000, 1000)));
        assert_eq!(parsed.get("eth0"), Some(&(3000, 2600)));
    }

    #[test]
    fn test_first_reading_is_zero_baseline() {
        let mut tracker = NetRateTracker::new();
        let rates = tracker.observe(
            counters(&[("eth0", 9_000_000, 7_000_000), ("lo", 5, 5)]),
            Instant::now(),
        );
        assert_eq!(rates.window_seconds, FIRST_SAMPLE_WINDOW_SECONDS);
        assert_eq!(rates.rates.get("eth0"), Some(&(0, 0)));
        assert_eq!(rates.rates.get("lo"), Some(&(0, 0)));
    }

    #[test]
    fn test_rate_over_window() {
        let mut tracker = NetRateTracker::new();
        let t0 = Instant::now();
        tracker.observe(counters(&[("eth0", 1000, 2000)]), t0);
        let rates = tracker.observe(
            counters(&[("eth0", 3000, 2600)]),
            t0 + Duration::from_secs(2),
        );
        assert!((rates.window_seconds - 2.0).abs() < 1e-9);
        assert_eq!(rates.rates.get("eth0"), Some(&(1000, 300)));
    }

    #[test]
    fn test_rates_truncate_toward_zero() {
        let mut tracker = NetRateTracker::new();
        let t0 = Instant::now();
        tracker.observe(counters(&[("eth0", 0, 10)]), t0);
        let rates = tracker.observe(counters(&[("eth0", 7, 3)]), t0 + Duration::from_secs(2));
        // 3.5 -> 3, -3.5 -> -3
        assert_eq!(rates.rates.get("eth0"), Some(&(3, -3)));
    }

    #[test]
    fn test_new_and_vanished_interfaces() {
        let mut tracker = NetRateTracker::new();
        let t0 = Instant::now();
        tracker.observe(counters(&[("eth0", 100, 100), ("veth1", 50, 50)]), t0);
        let rates = tracker.observe(
            counters(&[("eth0", 300, 100), ("wg0", 123_456, 654_321)]),
            t0 + Duration::from_secs(1),
        );
        assert_eq!(rates.rates.len(), 2);
        assert_eq!(rates.rates.get("eth0"), Some(&(200, 0)));
        assert_eq!(rates.rates.get("wg0"), Some(&(0, 0)));
        assert!(!rates.rates.contains_key("veth1"));
    }

    #[test]
    fn test_zero_elapsed_uses_floor() {
        let mut tracker = NetRateTracker::new();
        let t0 = Instant::now();
        tracker.observe(counters(&[("eth0", 0, 0)]), t0);
        let rates = tracker.observe(counters(&[("eth0", 1, 2)]), t0);
        assert_eq!(rates.window_seconds, MIN_WINDOW_SECONDS);
        assert_eq!(rates.rates.get("eth0"), Some(&(1000, 2000)));
    }

    #[test]
    fn test_totals() {
        let mut rates = BTreeMap::new();
        rates.insert("eth0".to_string(), (100, 10));
        rates.insert("eth1".to_string(), (50, 5));
        let net = NetRates {
            window_seconds: 1.0,
            rates,
        };
        assert_eq!(net.total_rx(), 150);
        assert_eq!(net.total_tx(), 15);
    }

    #[test]
    fn test_is_virtual_interface() {
        assert!(is_virtual_interface("lo"));
        assert!(is_virtual_interface("vmbr0"));
        assert!(is_virtual_interface("veth100i0"));
        assert!(is_virtual_interface("tap101i0"));
        assert!(is_virtual_interface("fwbr101i0"));
        assert!(!is_virtual_interface("eth0"));
        assert!(!is_virtual_interface("enp3s0"));
        assert!(!is_virtual_interface("lo0"));
    }

    #[test]
    fn test_read_netdev_counters() {
        let result = read_netdev_counters();
        assert!(result.is_ok(), "Failed to read netdev counters: {:?}", result);
        assert!(result.unwrap().contains_key("lo"), "Loopback interface not found");
    }
}
