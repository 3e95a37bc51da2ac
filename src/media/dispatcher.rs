//! Media-button dispatcher.
//!
//! Normalizes the broadcast-style and session-callback entry points into a
//! single classified command and forwards it to the control task. Button
//! events are only honoured after registration and while the playback-session
//! claim is held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::time::Instant;

use crate::daemon::controller::ControllerHandle;

use super::error::DispatchError;
use super::keys::{classify, ButtonCommand, KeyCode, KeyInput};
use super::session::{DoublePressDetector, MediaSession};

// ============================================================================
// Entry points
// ============================================================================

/// Session-callback style event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCallback {
    /// onPlay
    Play,
    /// onPause
    Pause,
    /// onStop
    Stop,
    /// onMediaButtonEvent carrying the raw key data
    MediaButton(KeyInput),
}

impl SessionCallback {
    /// Converts the callback into the key event it stands for.
    pub fn into_key_input(self) -> KeyInput {
        match self {
            SessionCallback::Play => KeyInput::press(KeyCode::Play),
            SessionCallback::Pause => KeyInput::press(KeyCode::Pause),
            SessionCallback::Stop => KeyInput::press(KeyCode::Stop),
            SessionCallback::MediaButton(input) => input,
        }
    }
}

impl From<crate::types::SessionAction> for SessionCallback {
    fn from(action: crate::types::SessionAction) -> Self {
        match action {
            crate::types::SessionAction::Play => SessionCallback::Play,
            crate::types::SessionAction::Pause => SessionCallback::Pause,
            crate::types::SessionAction::Stop => SessionCallback::Stop,
        }
    }
}

/// Why an event did not reach the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The dispatcher has not been registered yet
    NotRegistered,
    /// The playback-session claim is released
    SessionReleased,
    /// The broadcast carried no key data
    MissingKey,
    /// Release edge or a key outside the play/pause sets
    Unclassified,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command was queued for the control task
    Forwarded(ButtonCommand),
    /// The event was dropped
    Ignored(IgnoreReason),
}

// ============================================================================
// MediaButtonDispatcher
// ============================================================================

/// Routes media-button events into the control task.
pub struct MediaButtonDispatcher {
    registered: AtomicBool,
    session: MediaSession,
    controller: ControllerHandle,
    volume_down: Mutex<DoublePressDetector>,
}

impl MediaButtonDispatcher {
    /// Creates an unregistered dispatcher.
    pub fn new(session: MediaSession, controller: ControllerHandle) -> Self {
        Self {
            registered: AtomicBool::new(false),
            session,
            controller,
            volume_down: Mutex::new(DoublePressDetector::default()),
        }
    }

    /// Registers the dispatcher for media-button delivery.
    ///
    /// Returns false if it was already registered; the second attempt is a
    /// no-op.
    pub fn register(&self) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            tracing::warn!("media button dispatcher already registered, ignoring");
            return false;
        }
        self.session.activate();
        tracing::info!("media button dispatcher registered");
        true
    }

    /// Returns true once registration has happened.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Returns the shared playback-session claim.
    pub fn session(&self) -> &MediaSession {
        &self.session
    }

    /// Handles a broadcast-style media-button event.
    pub fn on_broadcast(&self, key: Option<KeyInput>) -> Result<DispatchOutcome, DispatchError> {
        match key {
            Some(input) => self.dispatch(input),
            None => {
                tracing::debug!("media button broadcast without key data");
                Ok(DispatchOutcome::Ignored(IgnoreReason::MissingKey))
            }
        }
    }

    /// Handles a session-callback style event.
    pub fn on_session_callback(
        &self,
        callback: SessionCallback,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(callback.into_key_input())
    }

    /// Handles a volume-down press.
    ///
    /// Two presses within the double-press window request the previous
    /// chapter. Returns true when a double press was detected.
    pub fn on_volume_down(&self, now: Instant) -> Result<bool, DispatchError> {
        let detected = {
            let mut detector = self
                .volume_down
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            detector.press(now)
        };

        if detected {
            tracing::info!("volume-down double press, requesting previous chapter");
            self.controller
                .previous_chapter()
                .map_err(|_| DispatchError::ControllerClosed)?;
        }
        Ok(detected)
    }

    fn dispatch(&self, input: KeyInput) -> Result<DispatchOutcome, DispatchError> {
        if !self.is_registered() {
            tracing::debug!(?input, "dispatcher not registered, dropping key event");
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NotRegistered));
        }
        if !self.session.is_active() {
            tracing::debug!(?input, "session claim released, key belongs to external app");
            return Ok(DispatchOutcome::Ignored(IgnoreReason::SessionReleased));
        }

        let Some(command) = classify(input) else {
            tracing::trace!(?input, "key event not classified");
            return Ok(DispatchOutcome::Ignored(IgnoreReason::Unclassified));
        };

        tracing::debug!(%command, code = input.code.raw(), "media button press");
        self.controller
            .button(command)
            .map_err(|_| DispatchError::ControllerClosed)?;
        Ok(DispatchOutcome::Forwarded(command))
    }
}

// ============================================================================
// Tests
// ============================================================================
