//! Serial request/response loop.
//!
//! One session owns one open serial link and the snapshot assembler (and with
//! it the CPU and network rate trackers). The loop reads newline-terminated
//! commands, answers `GET` with one line of JSON and silently ignores anything
//! else. A link fault ends the session once the device node is present again;
//! reopening is left to the supervisor that restarts the process.

use crate::config::Config;
use crate::serial::{LineIo, LinkError, SerialLink};
use crate::snapshot::{SnapshotAssembler, SnapshotSource};
use crate::wait::{DeviceWaiter, WaitOutcome};
use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounded read timeout so the loop can observe cancellation.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after an unexpected fault that does not affect the link.
pub const FAULT_PAUSE: Duration = Duration::from_millis(100);

/// Pause after the device reappears, before the session ends.
pub const RECONNECT_SETTLE: Duration = Duration::from_secs(1);

/// Recognized serial commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Get,
}

impl Command {
    /// Case-insensitive match after trimming. Unknown commands are `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_uppercase().as_str() {
            "GET" => Some(Command::Get),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Responding,
    Disconnected,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The link failed and the device node is present again.
    Disconnected,
    /// Shutdown was requested.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("serial link fault: {0}")]
    Link(#[source] io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct Session<IO, S> {
    io: IO,
    source: S,
    waiter: DeviceWaiter,
    trace: bool,
    state: SessionState,
    served: u64,
}

impl<IO: LineIo, S: SnapshotSource> Session<IO, S> {
    /// `trace` logs every received line and every payload at debug level.
    pub fn new(io: IO, source: S, waiter: DeviceWaiter, trace: bool) -> Self {
        Self {
            io,
            source,
            waiter,
            trace,
            state: SessionState::Idle,
            served: 0,
        }
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of GET requests answered.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Runs until the link fails or cancellation is requested.
    pub fn run(&mut self) -> SessionEnd {
        let mut buf = String::new();

        loop {
            if self.waiter.is_cancelled() {
                return SessionEnd::Cancelled;
            }

            match self.cycle(&mut buf) {
                Ok(_) => {}
                Err(CycleError::Link(e)) => {
                    warn!("Serial disconnected ({}), waiting...", e);
                    return self.disconnect();
                }
                Err(e) => {
                    warn!("{}", e);
                    self.state = SessionState::Idle;
                    self.waiter.pause(FAULT_PAUSE);
                }
            }
        }
    }

    /// One read and, for GET, one response. Returns the handled command.
    pub fn cycle(&mut self, buf: &mut String) -> Result<Option<Command>, CycleError> {
        self.state = SessionState::Idle;

        if self.io.read_line(buf).map_err(CycleError::Link)? == 0 {
            return Ok(None);
        }

        let line = buf.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if self.trace {
            debug!("<- {}", line);
        }

        match Command::parse(line) {
            Some(Command::Get) => {
                self.respond()?;
                Ok(Some(Command::Get))
            }
            None => {
                debug!("Ignoring unrecognized command: {:?}", line);
                Ok(None)
            }
        }
    }

    fn respond(&mut self) -> Result<(), CycleError> {
        self.state = SessionState::Responding;

        let payload = self.source.snapshot().to_line()?;
        if self.trace {
            debug!("-> {}", payload);
        }

        self.io
            .write_line(&format!("{}\n", payload))
            .map_err(CycleError::Link)?;

        self.served += 1;
        self.state = SessionState::Idle;
        Ok(())
    }

    fn disconnect(&mut self) -> SessionEnd {
        self.state = SessionState::Disconnected;

        match self.waiter.wait() {
            WaitOutcome::Cancelled => SessionEnd::Cancelled,
            WaitOutcome::Present => {
                self.waiter.pause(RECONNECT_SETTLE);
                SessionEnd::Disconnected
            }
        }
    }
}

/// Waits for the configured device, opens it and runs one session.
pub fn serve(config: &Config, cancel: CancellationToken) -> Result<SessionEnd, LinkError> {
    let device = config.device();
    let waiter = DeviceWaiter::for_path(device, cancel);

    if waiter.wait() == WaitOutcome::Cancelled {
        return Ok(SessionEnd::Cancelled);
    }

    let link = SerialLink::open(device, config.baud(), READ_TIMEOUT)?;
    info!("Using serial: {} (baud={})", device, config.baud());

    let mut session = Session::new(link, SnapshotAssembler::new(), waiter, config.trace_enabled());
    let end = session.run();

    info!(
        "Session ended ({:?}) after {} responses",
        end,
        session.served()
    );
    Ok(end)
}
