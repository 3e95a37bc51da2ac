//! Playback-session claim and volume-key double press detection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::{Duration, Instant};

/// Window in which two volume-down presses count as a double press.
pub const DOUBLE_PRESS_WINDOW: Duration = Duration::from_millis(500);

// ============================================================================
// MediaSession
// ============================================================================

/// The local playback-session claim.
///
/// While the claim is held, media buttons are routed to this controller.
/// While released, they go to the external application. Clones share the
/// same claim.
#[derive(Debug, Clone)]
pub struct MediaSession {
    active: Arc<AtomicBool>,
}

impl Default for MediaSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSession {
    /// Creates a session that holds the claim.
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Re-acquires the claim.
    pub fn activate(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("media session claim acquired");
        }
    }

    /// Releases the claim.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::debug!("media session claim released");
        }
    }

    /// Returns true while the claim is held.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ============================================================================
// DoublePressDetector
// ============================================================================

/// Detects two presses within a fixed window.
#[derive(Debug, Clone)]
pub struct DoublePressDetector {
    window: Duration,
    last_press: Option<Instant>,
}

impl Default for DoublePressDetector {
    fn default() -> Self {
        Self::new(DOUBLE_PRESS_WINDOW)
    }
}

impl DoublePressDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: None,
        }
    }

    /// Records a press and returns true if it completes a double press.
    ///
    /// The detector resets after a double press, so a third press opens a
    /// new window.
    pub fn press(&mut self, now: Instant) -> bool {
        match self.last_press {
            Some(last) if now.saturating_duration_since(last) <= self.window => {
                self.last_press = None;
                true
            }
            _ => {
                self.last_press = Some(now);
                false
            }
        }
    }
}
