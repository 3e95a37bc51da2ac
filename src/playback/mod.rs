//! External playback control.
//!
//! This module signals the uncontrolled external audio application:
//! - `sequence`: the fixed step lists for each operation
//! - `target`: transports that deliver launch and key requests
//! - [`ExternalPlaybackController`]: runs sequences on their own tasks
//!
//! # Overview
//!
//! The external application and this controller compete for the playback
//! session. Every operation releases the local claim, waits, sends a key
//! down/up pair addressed to the application, then re-acquires the claim.
//! Nothing is acknowledged, so every operation is fire-and-forget and
//! overlapping sequences are tolerated.
//!
//! # Error Handling
//!
//! Each step is guarded on its own. A failing step is logged at `warn` and
//! the sequence continues; see [`PlaybackError::is_recoverable`].

pub mod error;
pub mod sequence;
pub mod target;

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::media::MediaSession;

pub use error::PlaybackError;
pub use sequence::{CommandSequence, PlaybackOp, PlaybackStep};
pub use target::{
    CommandPlaybackTarget, LoggingPlaybackTarget, MockPlaybackTarget, PlaybackTarget, TargetCall,
};

// ============================================================================
// PlaybackControl
// ============================================================================

/// Playback operations requested by the timer engine.
///
/// Implementations must return immediately; the work happens elsewhere.
pub trait PlaybackControl: Send + Sync {
    fn start(&self);
    fn nudge_play(&self);
    fn pause(&self);
    fn stop(&self);
    fn previous_chapter(&self);
}

// ============================================================================
// ExternalPlaybackController
// ============================================================================

/// Runs playback sequences against a target.
pub struct ExternalPlaybackController<T: PlaybackTarget> {
    target: Arc<T>,
    session: MediaSession,
}

impl<T: PlaybackTarget> Clone for ExternalPlaybackController<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            session: self.session.clone(),
        }
    }
}

impl<T: PlaybackTarget> ExternalPlaybackController<T> {
    pub fn new(target: Arc<T>, session: MediaSession) -> Self {
        Self { target, session }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    /// Spawns a sequence on its own task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sequence(&self, sequence: CommandSequence) -> JoinHandle<()> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("playback", op = %sequence.op(), %id);
        let target = Arc::clone(&self.target);
        let session = self.session.clone();

        tokio::spawn(
            async move {
                execute_sequence(target.as_ref(), &session, &sequence).await;
            }
            .instrument(span),
        )
    }
}

/// Executes every step of a sequence in order.
pub async fn execute_sequence<T: PlaybackTarget + ?Sized>(
    target: &T,
    session: &MediaSession,
    sequence: &CommandSequence,
) {
    debug!("playback sequence started");
    for step in sequence.steps() {
        match *step {
            PlaybackStep::Wait(delay) => tokio::time::sleep(delay).await,
            PlaybackStep::ReleaseSession => session.deactivate(),
            PlaybackStep::AcquireSession => session.activate(),
            PlaybackStep::Launch => {
                if let Err(e) = target.launch() {
                    warn!(error = %e, "launch failed, continuing with key events");
                }
            }
            PlaybackStep::Key(key, edge) => {
                if let Err(e) = target.send_key(key, edge) {
                    warn!(error = %e, %key, edge = edge.as_str(), "key event failed");
                }
            }
        }
    }
    debug!("playback sequence finished");
}

impl<T: PlaybackTarget> PlaybackControl for ExternalPlaybackController<T> {
    fn start(&self) {
        self.spawn_sequence(CommandSequence::start());
    }

    fn nudge_play(&self) {
        self.spawn_sequence(CommandSequence::nudge_play());
    }

    fn pause(&self) {
        self.spawn_sequence(CommandSequence::pause());
    }

    fn stop(&self) {
        self.spawn_sequence(CommandSequence::stop());
    }

    fn previous_chapter(&self) {
        self.spawn_sequence(CommandSequence::previous_chapter());
    }
}

// ============================================================================
// MockPlaybackControl
// ============================================================================

/// Mock playback control for testing. Records requested operations.
#[derive(Debug, Default)]
pub struct MockPlaybackControl {
    ops: Mutex<Vec<PlaybackOp>>,
}

impl MockPlaybackControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<PlaybackOp> {
        self.ops
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, op: PlaybackOp) -> usize {
        self.ops().iter().filter(|o| **o == op).count()
    }

    pub fn reset(&self) {
        self.ops
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn record(&self, op: PlaybackOp) {
        self.ops
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(op);
    }
}

impl PlaybackControl for MockPlaybackControl {
    fn start(&self) {
        self.record(PlaybackOp::Start);
    }

    fn nudge_play(&self) {
        self.record(PlaybackOp::NudgePlay);
    }

    fn pause(&self) {
        self.record(PlaybackOp::Pause);
    }

    fn stop(&self) {
        self.record(PlaybackOp::Stop);
    }

    fn previous_chapter(&self) {
        self.record(PlaybackOp::PreviousChapter);
    }
}

// ============================================================================
// Tests
// ============================================================================
