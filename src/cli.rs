//! CLI arguments for hl-hostmon.
//!
//! The responder is configured through its config file; the only flag selects
//! which file to read.

use clap::Parser;
use std::path::PathBuf;

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "hl-hostmon",
    about = "Serial-line host telemetry responder",
    long_about = "Serial-line host telemetry responder.\n\n\
                  Listens on a serial device for the GET command and answers with a single \
                  line of JSON describing CPU, memory, disks, network, routing and Proxmox \
                  guests. Exits after the serial device disconnects so a supervisor can \
                  start a fresh session.",
    version
)]
pub struct Args {
    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}
