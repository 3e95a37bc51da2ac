//! Timer engine for the sleep timer.
//!
//! This module provides the core state machine:
//! - Phase transitions (Idle → Running ⇄ Paused, Running → Completed → Idle)
//! - Elapsed/remaining time across pause, resume and duration changes
//! - The single completion deadline
//! - Driving `NotificationSync`, playback requests and UI events
//!
//! The engine never sleeps or spawns. Every transition takes `now`
//! explicitly and the control task awaits the deadlines it exposes.

use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::DurationConfig;
use crate::events::{EventSink, UiEvent};
use crate::media::{ButtonCommand, MediaSession};
use crate::notification::{
    NotificationSync, StatusSurface, STATUS_COMPLETED, STATUS_PAUSED, STATUS_STOPPED,
};
use crate::playback::PlaybackControl;
use crate::types::{validate_minutes, TimerPhase, TimerSnapshot, MAX_DURATION_MINUTES};

// ============================================================================
// TimerError
// ============================================================================

/// Errors returned by explicit timer operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The operation needs a running countdown.
    #[error("タイマーは実行されていません")]
    NotRunning,

    /// The operation needs a paused countdown.
    #[error("タイマーは一時停止していません")]
    NotPaused,

    /// The operation needs a running or paused countdown.
    #[error("停止できるタイマーがありません")]
    NotActive,

    /// The requested duration is out of range.
    #[error("無効なタイマー時間です: {0}秒")]
    InvalidDuration(u64),

    /// The control task has shut down.
    #[error("タイマー制御タスクが停止しています")]
    ControllerClosed,
}

impl TimerError {
    /// Returns true if the error comes from the current phase.
    #[must_use]
    pub fn is_phase_error(&self) -> bool {
        matches!(self, Self::NotRunning | Self::NotPaused | Self::NotActive)
    }

    /// Returns true if the daemon keeps working after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ControllerClosed)
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NotRunning => "sleep-timer press play でタイマーを開始してください",
            Self::NotPaused => "一時停止中のタイマーのみ再開できます",
            Self::NotActive => "sleep-timer status で現在の状態を確認してください",
            Self::InvalidDuration(_) => "タイマー時間は1-999分の範囲で指定してください",
            Self::ControllerClosed => "デーモンを再起動してください: sleep-timer daemon",
        }
    }
}

// ============================================================================
// ButtonOutcome
// ============================================================================

/// What a classified button press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonOutcome {
    /// A new run started
    Started,
    /// Playback was nudged; the countdown is unchanged
    PlaybackNudged,
    /// Playback was paused; the countdown keeps running
    PlaybackPaused,
    /// Nothing happened in the current phase
    Ignored,
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Sleep timer state machine.
pub struct TimerEngine {
    phase: TimerPhase,
    /// Start of the current running segment
    start_timestamp: Option<Instant>,
    /// Duration applicable to the current run
    total_duration_millis: u64,
    /// Length of the segment measured from `start_timestamp`
    segment_millis: u64,
    remaining_at_pause: Option<u64>,
    completion_deadline: Option<Instant>,
    completed_runs: u64,
    notification: NotificationSync,
    duration: Arc<dyn DurationConfig>,
    playback: Arc<dyn PlaybackControl>,
    events: Arc<dyn EventSink>,
    session: MediaSession,
}

impl TimerEngine {
    /// Creates an idle engine wired to its collaborators.
    pub fn new(
        duration: Arc<dyn DurationConfig>,
        playback: Arc<dyn PlaybackControl>,
        events: Arc<dyn EventSink>,
        surface: Arc<dyn StatusSurface>,
        session: MediaSession,
    ) -> Self {
        Self {
            phase: TimerPhase::Idle,
            start_timestamp: None,
            total_duration_millis: 0,
            segment_millis: 0,
            remaining_at_pause: None,
            completion_deadline: None,
            completed_runs: 0,
            notification: NotificationSync::new(surface),
            duration,
            playback,
            events,
            session,
        }
    }

    /// Applies a classified button press.
    pub fn handle_button(&mut self, command: ButtonCommand, now: Instant) -> ButtonOutcome {
        self.events.emit(UiEvent::ButtonPressed { command });

        match (self.phase, command) {
            (TimerPhase::Idle | TimerPhase::Completed, ButtonCommand::Play) => {
                self.start_new_run(now);
                ButtonOutcome::Started
            }
            (TimerPhase::Running, ButtonCommand::Play) => {
                debug!("play while running, nudging playback only");
                self.playback.nudge_play();
                ButtonOutcome::PlaybackNudged
            }
            (TimerPhase::Running, ButtonCommand::Pause) => {
                debug!("pause while running, pausing playback only");
                self.playback.pause();
                ButtonOutcome::PlaybackPaused
            }
            (phase, command) => {
                debug!(phase = phase.as_str(), %command, "button ignored in this phase");
                ButtonOutcome::Ignored
            }
        }
    }

    fn start_new_run(&mut self, now: Instant) {
        let total = self.duration.configured_duration_seconds() * 1000;

        self.phase = TimerPhase::Running;
        self.total_duration_millis = total;
        self.remaining_at_pause = None;
        self.arm(now, total);

        info!(duration_ms = total, "sleep timer started");
        self.events.emit(UiEvent::Started);
        self.playback.start();
        self.notification.start(now);
    }

    /// Pauses the countdown and keeps the remaining time.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is not running.
    pub fn pause_timer(&mut self, now: Instant) -> Result<(), TimerError> {
        if self.phase != TimerPhase::Running {
            return Err(TimerError::NotRunning);
        }

        let remaining = self.remaining_millis(now);
        self.phase = TimerPhase::Paused;
        self.remaining_at_pause = Some(remaining);
        self.disarm();
        self.notification.cancel();
        self.notification.push(STATUS_PAUSED, remaining);

        info!(remaining_ms = remaining, "sleep timer paused");
        self.events.emit(UiEvent::Paused);
        self.playback.pause();
        Ok(())
    }

    /// Resumes a paused countdown from its remaining time.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is not paused.
    pub fn resume_timer(&mut self, now: Instant) -> Result<(), TimerError> {
        if self.phase != TimerPhase::Paused {
            return Err(TimerError::NotPaused);
        }

        let remaining = self.remaining_at_pause.take().unwrap_or(0);
        self.phase = TimerPhase::Running;
        self.arm(now, remaining);

        info!(remaining_ms = remaining, "sleep timer resumed");
        self.events.emit(UiEvent::Resumed);
        self.playback.start();
        self.notification.start(now);
        Ok(())
    }

    /// Stops a running or paused countdown without touching playback.
    ///
    /// # Errors
    ///
    /// Returns an error if no countdown is active.
    pub fn stop_timer(&mut self, _now: Instant) -> Result<(), TimerError> {
        if !self.phase.is_active() {
            return Err(TimerError::NotActive);
        }

        self.reset();
        self.notification.cancel();
        self.notification.push(STATUS_STOPPED, 0);

        info!("sleep timer stopped");
        self.events.emit(UiEvent::Stopped);
        Ok(())
    }

    /// Changes the configured duration.
    ///
    /// While running, the countdown restarts from the full new duration at
    /// `now`. It is not reduced by the time already elapsed. In any other
    /// phase only the configured value changes; a paused remaining time is
    /// kept as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is out of range.
    pub fn change_duration(&mut self, seconds: u64, now: Instant) -> Result<(), TimerError> {
        if seconds == 0 || seconds > u64::from(MAX_DURATION_MINUTES) * 60 {
            return Err(TimerError::InvalidDuration(seconds));
        }

        self.duration.set_configured_duration_seconds(seconds);

        if self.phase == TimerPhase::Running {
            let total = seconds * 1000;
            self.total_duration_millis = total;
            self.arm(now, total);
            self.notification.start(now);

            info!(seconds, "running timer restarted with new duration");
            self.events.emit(UiEvent::DurationUpdated { seconds });
        } else {
            debug!(seconds, phase = self.phase.as_str(), "configured duration changed");
        }
        Ok(())
    }

    /// Applies a preset picked on the status surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the preset is out of range.
    pub fn select_preset(&mut self, minutes: u32, now: Instant) -> Result<(), TimerError> {
        validate_minutes(minutes).map_err(|_| TimerError::InvalidDuration(u64::from(minutes) * 60))?;
        self.change_duration(u64::from(minutes) * 60, now)?;
        self.events.emit(UiEvent::PresetSelected { minutes });
        Ok(())
    }

    /// Fires the completion deadline.
    ///
    /// Returns false if no completion was pending.
    pub fn on_completion(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.completion_deadline else {
            return false;
        };

        let late_by = now.saturating_duration_since(deadline);
        self.phase = TimerPhase::Completed;
        self.session.deactivate();
        self.playback.stop();
        self.reset();
        self.completed_runs += 1;

        info!(late_ms = late_by.as_millis() as u64, "sleep timer completed");
        self.events.emit(UiEvent::Completed);
        self.notification.cancel();
        self.notification.push(STATUS_COMPLETED, 0);
        true
    }

    /// Performs a due notification tick.
    pub fn on_tick(&mut self, now: Instant) {
        if self.phase != TimerPhase::Running {
            self.notification.cancel();
            return;
        }
        let remaining = self.remaining_millis(now);
        self.notification.tick(now, remaining);
    }

    /// Requests the previous chapter from the external application.
    pub fn previous_chapter(&self) {
        self.playback.previous_chapter();
    }

    /// Handles a close request from the host.
    pub fn close(&mut self, now: Instant) {
        self.events.emit(UiEvent::CloseRequested);
        if self.phase.is_active() {
            let _ = self.stop_timer(now);
        }
    }

    /// Remaining time of the current run.
    pub fn remaining_millis(&self, now: Instant) -> u64 {
        match self.phase {
            TimerPhase::Running => {
                let elapsed = self
                    .start_timestamp
                    .map(|start| now.saturating_duration_since(start).as_millis() as u64)
                    .unwrap_or(0);
                self.segment_millis.saturating_sub(elapsed)
            }
            TimerPhase::Paused => self.remaining_at_pause.unwrap_or(0),
            TimerPhase::Idle | TimerPhase::Completed => 0,
        }
    }

    /// Returns a snapshot of the current state.
    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            remaining_millis: self.remaining_millis(now),
            total_duration_millis: self.total_duration_millis,
            configured_duration_seconds: self.duration.configured_duration_seconds(),
            status_text: self.notification.last_text().map(str::to_string),
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    /// Deadline of the single pending completion, if any.
    pub fn completion_deadline(&self) -> Option<Instant> {
        self.completion_deadline
    }

    /// Deadline of the pending notification tick, if any.
    pub fn next_tick(&self) -> Option<Instant> {
        self.notification.next_tick()
    }

    pub fn notification(&self) -> &NotificationSync {
        &self.notification
    }

    /// Number of runs that reached completion.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs
    }

    fn arm(&mut self, now: Instant, millis: u64) {
        self.start_timestamp = Some(now);
        self.segment_millis = millis;
        // replacing the deadline is the cancel
        self.completion_deadline = Some(now + Duration::from_millis(millis));
    }

    fn disarm(&mut self) {
        self.start_timestamp = None;
        self.segment_millis = 0;
        self.completion_deadline = None;
    }

    fn reset(&mut self) {
        self.disarm();
        self.phase = TimerPhase::Idle;
        self.total_duration_millis = 0;
        self.remaining_at_pause = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
