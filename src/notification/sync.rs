//! Periodic status synchronization.
//!
//! `NotificationSync` owns the 1 Hz tick deadline. It does not run on its
//! own: the control task awaits [`NotificationSync::next_tick`] and calls
//! back in, so cancelling is just clearing the deadline on that task.

use std::sync::Arc;

use tokio::time::{Duration, Instant};

use super::surface::StatusSurface;

/// Interval between running-status updates.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Status text while the countdown runs.
pub const STATUS_RUNNING: &str = "Timer Running";
/// Status text while the countdown is paused.
pub const STATUS_PAUSED: &str = "Timer Paused";
/// Status text after the countdown finished.
pub const STATUS_COMPLETED: &str = "Timer completed";
/// Status text after an explicit stop.
pub const STATUS_STOPPED: &str = "Timer stopped";

/// Keeps the status surface in step with the timer.
pub struct NotificationSync {
    surface: Arc<dyn StatusSurface>,
    next_tick: Option<Instant>,
    last_text: Option<String>,
    tick_count: u64,
}

impl NotificationSync {
    pub fn new(surface: Arc<dyn StatusSurface>) -> Self {
        Self {
            surface,
            next_tick: None,
            last_text: None,
            tick_count: 0,
        }
    }

    /// Starts ticking. The first tick is due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now);
    }

    /// Cancels the pending tick.
    pub fn cancel(&mut self) {
        if self.next_tick.take().is_some() {
            tracing::trace!("notification tick cancelled");
        }
    }

    /// Returns true while a tick is scheduled.
    pub fn is_ticking(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Returns the deadline of the pending tick.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Performs a due tick and schedules the next one.
    ///
    /// The next deadline is derived from the previous one, not from `now`,
    /// so late wakeups do not accumulate drift.
    pub fn tick(&mut self, now: Instant, remaining_millis: u64) {
        let Some(due) = self.next_tick else {
            return;
        };
        self.tick_count += 1;
        self.push(STATUS_RUNNING, remaining_millis);

        let mut next = due + TICK_INTERVAL;
        while next <= now {
            next += TICK_INTERVAL;
        }
        self.next_tick = Some(next);
    }

    /// Pushes one status line. Surface errors are logged and swallowed.
    pub fn push(&mut self, text: &str, remaining_millis: u64) {
        match self.surface.update_status(text, remaining_millis) {
            Ok(()) => {}
            Err(e) if e.is_detached() => {
                tracing::debug!(text, "no status observer attached");
            }
            Err(e) => {
                tracing::warn!(error = %e, text, "status surface update failed");
            }
        }
        self.last_text = Some(text.to_string());
    }

    /// Returns the last text pushed, whether or not the surface accepted it.
    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    /// Returns the number of running ticks performed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
