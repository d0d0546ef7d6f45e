//! Liveness timers guarding server replies.

use std::future::pending;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Per-command reply window.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);
/// Post-DATA window, allowing for slower server-side processing.
pub const DATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Which liveness window to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Short window: waiting for the reply to a single command.
    Command,
    /// Long window: waiting for the verdict on a transmitted message body.
    Data,
}

/// A one-shot reply deadline.
///
/// At most one deadline is armed at a time; arming replaces any armed
/// deadline and any received server line disarms it. While disarmed,
/// [`Watchdog::expired`] never resolves.
#[derive(Debug)]
pub struct Watchdog {
    command: Duration,
    data: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// Creates a disarmed watchdog with the given window durations.
    #[must_use]
    pub const fn new(command: Duration, data: Duration) -> Self {
        Self {
            command,
            data,
            deadline: None,
        }
    }

    /// Arms the given window, replacing any armed deadline.
    pub fn arm(&mut self, window: Window) {
        let duration = match window {
            Window::Command => self.command,
            Window::Data => self.data,
        };
        self.deadline = Some(Instant::now() + duration);
    }

    /// Cancels the armed deadline.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is currently armed.
    #[must_use]
    pub const fn armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the armed deadline passes. Never resolves while
    /// disarmed.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(COMMAND_TIMEOUT, DATA_TIMEOUT)
    }
}
