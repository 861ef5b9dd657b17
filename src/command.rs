//! External tool invocation.
//!
//! Disk power state, routing and Proxmox inventory come from OS utilities.
//! Readers only see the narrow [`CommandRunner`] capability so their parsing can
//! be exercised with canned output.

use std::collections::{HashMap, HashSet};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use tracing::debug;

/// Capability to run an external tool and capture its output.
pub trait CommandRunner {
    /// Runs `program` with `args` and returns trimmed stdout.
    /// Returns `None` if the tool cannot be spawned or exits unsuccessfully.
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;

    /// Whether `program` can be found on `PATH`.
    fn exists(&self, program: &str) -> bool;
}

/// Runs real OS tools. stderr is discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommands;

impl CommandRunner for SystemCommands {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                debug!("Failed to spawn {}: {}", program, e);
                return None;
            }
        };

        if !output.status.success() {
            debug!("{} {:?} exited with {}", program, args, output.status);
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Test double returning canned output keyed by the full command line
/// (`"program arg1 arg2"`). Unknown command lines fail like a missing tool.
#[derive(Debug, Default)]
pub struct CannedCommands {
    outputs: HashMap<String, String>,
    installed: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl CannedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `program` as present on `PATH` without any canned output.
    pub fn with_tool(mut self, program: &str) -> Self {
        self.installed.insert(program.to_string());
        self
    }

    /// Registers the output for a command line; its program counts as installed.
    pub fn with_output(mut self, command_line: &str, stdout: &str) -> Self {
        if let Some(program) = command_line.split_whitespace().next() {
            self.installed.insert(program.to_string());
        }
        self.outputs
            .insert(command_line.to_string(), stdout.trim().to_string());
        self
    }

    /// Every command line passed to `run`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CommandRunner for CannedCommands {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        self.outputs.get(&line).cloned()
    }

    fn exists(&self, program: &str) -> bool {
        self.installed.contains(program)
    }
}
