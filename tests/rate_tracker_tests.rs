//! Tests for the CPU and network delta trackers across request sequences.

use hl_hostmon::collectors::netdev::{NetCounters, NetRateTracker, FIRST_SAMPLE_WINDOW_SECONDS};
use hl_hostmon::system::{CpuStat, CpuUsageTracker};
use std::time::{Duration, Instant};

fn cpu(busy: u64, idle: u64) -> CpuStat {
    CpuStat {
        user: busy,
        idle,
        ..Default::default()
    }
}

fn counters(entries: &[(&str, u64, u64)]) -> NetCounters {
    entries
        .iter()
        .map(|&(name, rx, tx)| (name.to_string(), (rx, tx)))
        .collect()
}

#[test]
fn test_cpu_percent_sequence() {
    let mut tracker = CpuUsageTracker::new();

    assert_eq!(tracker.observe(cpu(100, 900)), None);
    // 50 busy / 100 total
    assert_eq!(tracker.observe(cpu(150, 950)), Some(50.0));
    // No progress in total time
    assert_eq!(tracker.observe(cpu(150, 950)), None);
    // Fully busy interval
    assert_eq!(tracker.observe(cpu(250, 950)), Some(100.0));
    // Fully idle interval
    assert_eq!(tracker.observe(cpu(250, 1050)), Some(0.0));
}

#[test]
fn test_cpu_percent_rounded_to_one_decimal() {
    let mut tracker = CpuUsageTracker::new();
    tracker.observe(cpu(0, 0));
    // 1 busy / 3 total = 33.333..%
    assert_eq!(tracker.observe(cpu(1, 2)), Some(33.3));
}

#[test]
fn test_cpu_counter_going_backwards_yields_none() {
    let mut tracker = CpuUsageTracker::new();
    tracker.observe(cpu(500, 500));
    assert_eq!(tracker.observe(cpu(10, 10)), None);
    assert_eq!(tracker.previous(), Some(cpu(10, 10)));
    assert_eq!(tracker.observe(cpu(20, 20)), Some(50.0));
}

#[test]
fn test_net_rates_three_requests() {
    let mut tracker = NetRateTracker::new();
    let t0 = Instant::now();

    let first = tracker.observe(counters(&[("eth0", 1000, 2000)]), t0);
    assert_eq!(first.window_seconds, FIRST_SAMPLE_WINDOW_SECONDS);
    assert_eq!(first.rates["eth0"], (0, 0));

    let second = tracker.observe(
        counters(&[("eth0", 3000, 2600)]),
        t0 + Duration::from_secs(2),
    );
    assert_eq!(second.window_seconds, 2.0);
    assert_eq!(second.rates["eth0"], (1000, 300));

    let third = tracker.observe(
        counters(&[("eth0", 3500, 2600)]),
        t0 + Duration::from_secs(3),
    );
    assert_eq!(third.window_seconds, 1.0);
    assert_eq!(third.rates["eth0"], (500, 0));
}

#[test]
fn test_net_new_interface_starts_at_zero() {
    let mut tracker = NetRateTracker::new();
    let t0 = Instant::now();
    tracker.observe(counters(&[("eth0", 0, 0)]), t0);

    let rates = tracker.observe(
        counters(&[("eth0", 100, 100), ("veth101i0", 5_000_000, 7_000_000)]),
        t0 + Duration::from_secs(1),
    );
    assert_eq!(rates.rates["eth0"], (100, 100));
    assert_eq!(rates.rates["veth101i0"], (0, 0));
}

#[test]
fn test_net_counter_reset_goes_negative() {
    let mut tracker = NetRateTracker::new();
    let t0 = Instant::now();
    tracker.observe(counters(&[("eth0", 10_000, 10_000)]), t0);

    let rates = tracker.observe(
        counters(&[("eth0", 0, 10_000)]),
        t0 + Duration::from_secs(2),
    );
    assert_eq!(rates.rates["eth0"], (-5000, 0));
    assert_eq!(rates.total_rx(), -5000);
}

#[test]
fn test_net_zero_elapsed_uses_minimum_window() {
    let mut tracker = NetRateTracker::new();
    let t0 = Instant::now();
    tracker.observe(counters(&[("eth0", 0, 0)]), t0);

    let rates = tracker.observe(counters(&[("eth0", 1, 2)]), t0);
    assert_eq!(rates.window_seconds, 0.001);
    assert_eq!(rates.rates["eth0"], (1000, 2000));
}
