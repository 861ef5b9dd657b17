//! Line-oriented serial transport.
//!
//! The protocol loop talks to a [`LineIo`]; production uses [`SerialLink`]
//! over the `serialport` crate, tests use [`ScriptedLineIo`].

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::time::Duration;

/// Longest partial line kept while waiting for its newline.
const MAX_LINE_BYTES: usize = 4096;

/// Newline-framed text transport.
pub trait LineIo {
    /// Reads the next complete line into `buf` (replacing its contents,
    /// newline included) and returns its length. Returns `Ok(0)` when the read
    /// timeout elapsed before a full line arrived. Any `Err` is a link fault.
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;

    /// Writes `line` exactly as given and flushes.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open serial device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: serialport::Error,
    },
}

/// An open serial device with a bounded read timeout.
pub struct SerialLink<P = Box<dyn serialport::SerialPort>> {
    reader: BufReader<P>,
    pending: Vec<u8>,
}

impl SerialLink {
    pub fn open(device: &str, baud: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let port = serialport::new(device, baud)
            .timeout(read_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                device: device.to_string(),
                source,
            })?;

        Ok(Self::new(port))
    }
}

impl<P: Read + Write> SerialLink<P> {
    /// Wraps an already opened port. Its reads must time out rather than block.
    pub fn new(port: P) -> Self {
        Self {
            reader: BufReader::new(port),
            pending: Vec::new(),
        }
    }
}

impl<P: Read + Write> LineIo for SerialLink<P> {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            // Readable but empty: the device went away
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "serial device returned no data (disconnected?)",
            )),
            Ok(_) if self.pending.ends_with(b"\n") => {
                *buf = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                Ok(buf.len())
            }
            Ok(_) => Ok(0),
            Err(e) if is_idle_error(&e) => {
                if self.pending.len() > MAX_LINE_BYTES {
                    self.pending.clear();
                }
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(line.as_bytes())?;
        port.flush()
    }
}

/// Timeouts and signal interruptions are not link faults.
pub fn is_idle_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// One scripted read result.
#[derive(Debug)]
pub enum ScriptStep {
    Line(String),
    Timeout,
    Fault(ErrorKind),
}

/// Test double: replays scripted reads and captures writes. When the script
/// runs out, reads fail with `UnexpectedEof` so a session ends on its own.
#[derive(Debug, Default)]
pub struct ScriptedLineIo {
    script: VecDeque<ScriptStep>,
    writes: Vec<String>,
    fail_writes: bool,
}

impl ScriptedLineIo {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: script.into(),
            writes: Vec::new(),
            fail_writes: false,
        }
    }

    /// Each entry becomes one received line with a trailing newline.
    pub fn with_lines(lines: &[&str]) -> Self {
        Self::new(
            lines
                .iter()
                .map(|l| ScriptStep::Line(format!("{}\n", l)))
                .collect(),
        )
    }

    /// Makes every write fail with `BrokenPipe`.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl LineIo for ScriptedLineIo {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(ScriptStep::Line(line)) => {
                *buf = line;
                Ok(buf.len())
            }
            Some(ScriptStep::Timeout) => Ok(0),
            Some(ScriptStep::Fault(kind)) => Err(io::Error::new(kind, "scripted fault")),
            None => Err(io::Error::new(ErrorKind::UnexpectedEof, "script exhausted")),
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "scripted write fault"));
        }
        self.writes.push(line.to_string());
        Ok(())
    }
}
