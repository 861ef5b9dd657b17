//! hl-hostmon library
//!
//! A passive host sensor for an external controller attached over a serial
//! line. The controller sends `GET`; the host answers with one line of compact
//! JSON describing CPU, memory, filesystems, disks, routing, network
//! throughput and Proxmox guests.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hl_hostmon::{SnapshotAssembler, SnapshotSource};
//!
//! let mut assembler = SnapshotAssembler::new();
//! let snapshot = assembler.snapshot();
//! println!("{}", snapshot.to_line().unwrap());
//! ```
//!
//! The first snapshot of a process reports `cpu.percent` as null and every
//! interface rate as zero; later snapshots are computed from the previous
//! sample.

pub mod cli;
pub mod collectors;
pub mod command;
pub mod config;
pub mod responder;
pub mod serial;
pub mod snapshot;
pub mod startup_checks;
pub mod system;
pub mod wait;

// Re-export main types for convenience
pub use command::{CannedCommands, CommandRunner, SystemCommands};
pub use config::Config;
pub use responder::{Command, Session, SessionEnd};
pub use serial::{LineIo, LinkError, ScriptStep, ScriptedLineIo, SerialLink};
pub use snapshot::{Snapshot, SnapshotAssembler, SnapshotSource, SCHEMA_VERSION, SCRIPT_VERSION};
pub use wait::{DeviceWaiter, RecordingPause, WaitOutcome};
