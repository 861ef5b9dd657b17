//! Cancellable waiting for the serial device.
//!
//! The daemon blocks until its device node exists, both before opening it and
//! after a disconnection. Sleeping goes through [`Pause`] so tests can run the
//! loops without real delays.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Interval between device presence checks.
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Blocking delay.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested pauses and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

impl<P: Pause + ?Sized> Pause for Arc<P> {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Present,
    Cancelled,
}

/// Polls for the device without a timeout until it appears or the wait is
/// cancelled.
pub struct DeviceWaiter {
    label: String,
    probe: Box<dyn Fn() -> bool + Send>,
    interval: Duration,
    pause: Box<dyn Pause + Send>,
    cancel: CancellationToken,
}

impl DeviceWaiter {
    pub fn new(
        label: impl Into<String>,
        probe: Box<dyn Fn() -> bool + Send>,
        interval: Duration,
        pause: Box<dyn Pause + Send>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            label: label.into(),
            probe,
            interval,
            pause,
            cancel,
        }
    }

    /// Waits for `path` to exist, sleeping for real between checks.
    pub fn for_path(path: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self::new(
            label,
            Box::new(move || path.exists()),
            DEVICE_POLL_INTERVAL,
            Box::new(ThreadPause),
            cancel,
        )
    }

    pub fn is_present(&self) -> bool {
        (self.probe)()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleeps through the configured [`Pause`].
    pub fn pause(&self, duration: Duration) {
        self.pause.pause(duration);
    }

    pub fn wait(&self) -> WaitOutcome {
        loop {
            if self.cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if self.is_present() {
                return WaitOutcome::Present;
            }
            debug!("Waiting for serial {}...", self.label);
            self.pause.pause(self.interval);
        }
    }
}
