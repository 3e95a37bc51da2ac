//! Playback command sequences.
//!
//! Each outbound operation is an ordered list of steps. Delays between
//! steps are fixed and keep the local session claim and the external
//! application from fighting over playback focus.

use std::fmt;

use tokio::time::Duration;

use crate::media::{KeyEdge, MediaKey};

// ============================================================================
// Constants
// ============================================================================

/// Wait after launching the external application.
pub const LAUNCH_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Wait after releasing the session claim before the first key edge.
pub const SESSION_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Wait between the down and up edges of one key.
pub const INTER_EDGE_DELAY: Duration = Duration::from_millis(50);

/// Wait before the stop key that follows a pause.
pub const STOP_FALLBACK_DELAY: Duration = Duration::from_millis(100);

/// Wait before re-acquiring the claim after a play key.
pub const REACQUIRE_AFTER_PLAY: Duration = Duration::from_millis(1000);

/// Wait before re-acquiring the claim after a pause or stop key.
pub const REACQUIRE_AFTER_PAUSE: Duration = Duration::from_millis(2000);

// ============================================================================
// PlaybackOp
// ============================================================================

/// Operations the controller performs on the external application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackOp {
    /// Launch the application and start playback
    Start,
    /// Resume playback only
    NudgePlay,
    /// Pause playback only
    Pause,
    /// Pause playback with a stop fallback
    Stop,
    /// Jump to the previous chapter
    PreviousChapter,
}

impl PlaybackOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackOp::Start => "start",
            PlaybackOp::NudgePlay => "nudge_play",
            PlaybackOp::Pause => "pause",
            PlaybackOp::Stop => "stop",
            PlaybackOp::PreviousChapter => "previous_chapter",
        }
    }
}

impl fmt::Display for PlaybackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PlaybackStep / CommandSequence
// ============================================================================

/// One step of a playback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    /// Launch the external application
    Launch,
    /// Release the local session claim
    ReleaseSession,
    /// Re-acquire the local session claim
    AcquireSession,
    /// Send one key edge to the external application
    Key(MediaKey, KeyEdge),
    /// Wait before the next step
    Wait(Duration),
}

/// Ordered steps for one playback operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence {
    op: PlaybackOp,
    steps: Vec<PlaybackStep>,
}

impl CommandSequence {
    /// Builds the sequence for an operation.
    pub fn for_op(op: PlaybackOp) -> Self {
        let mut steps = Vec::new();

        if op == PlaybackOp::Start {
            steps.push(PlaybackStep::Launch);
            steps.push(PlaybackStep::Wait(LAUNCH_SETTLE_DELAY));
        }

        steps.push(PlaybackStep::ReleaseSession);
        steps.push(PlaybackStep::Wait(SESSION_SETTLE_DELAY));

        let reacquire = match op {
            PlaybackOp::Start | PlaybackOp::NudgePlay => {
                push_key(&mut steps, MediaKey::Play);
                REACQUIRE_AFTER_PLAY
            }
            PlaybackOp::Pause => {
                push_key(&mut steps, MediaKey::Pause);
                REACQUIRE_AFTER_PAUSE
            }
            PlaybackOp::Stop => {
                push_key(&mut steps, MediaKey::Pause);
                steps.push(PlaybackStep::Wait(STOP_FALLBACK_DELAY));
                push_key(&mut steps, MediaKey::Stop);
                REACQUIRE_AFTER_PAUSE
            }
            PlaybackOp::PreviousChapter => {
                push_key(&mut steps, MediaKey::Previous);
                REACQUIRE_AFTER_PLAY
            }
        };

        steps.push(PlaybackStep::Wait(reacquire));
        steps.push(PlaybackStep::AcquireSession);

        Self { op, steps }
    }

    pub fn start() -> Self {
        Self::for_op(PlaybackOp::Start)
    }

    pub fn nudge_play() -> Self {
        Self::for_op(PlaybackOp::NudgePlay)
    }

    pub fn pause() -> Self {
        Self::for_op(PlaybackOp::Pause)
    }

    pub fn stop() -> Self {
        Self::for_op(PlaybackOp::Stop)
    }

    pub fn previous_chapter() -> Self {
        Self::for_op(PlaybackOp::PreviousChapter)
    }

    pub fn op(&self) -> PlaybackOp {
        self.op
    }

    pub fn steps(&self) -> &[PlaybackStep] {
        &self.steps
    }

    /// Sum of all waits in the sequence.
    pub fn total_delay(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                PlaybackStep::Wait(d) => *d,
                _ => Duration::ZERO,
            })
            .sum()
    }

    /// Offset from the sequence start at which the given step runs.
    pub fn offset_of(&self, index: usize) -> Duration {
        self.steps[..index.min(self.steps.len())]
            .iter()
            .map(|step| match step {
                PlaybackStep::Wait(d) => *d,
                _ => Duration::ZERO,
            })
            .sum()
    }
}

fn push_key(steps: &mut Vec<PlaybackStep>, key: MediaKey) {
    steps.push(PlaybackStep::Key(key, KeyEdge::Down));
    steps.push(PlaybackStep::Wait(INTER_EDGE_DELAY));
    steps.push(PlaybackStep::Key(key, KeyEdge::Up));
}
