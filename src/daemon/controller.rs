//! Single control task.
//!
//! All timer state lives in one `TimerEngine` owned by [`Controller::run`].
//! Button events, explicit requests, the completion deadline and the
//! notification tick are serialized through one `select!` loop, so no
//! locks guard the engine.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::media::ButtonCommand;
use crate::types::TimerSnapshot;

use super::timer::{TimerEngine, TimerError};

type Reply<T> = oneshot::Sender<T>;

// ============================================================================
// ControlMessage
// ============================================================================

/// Inputs accepted by the control task.
#[derive(Debug)]
pub enum ControlMessage {
    /// A classified media-button press
    Button(ButtonCommand),
    /// A detected volume-down double press
    PreviousChapter,
    /// Change the configured duration
    SetDuration {
        seconds: u64,
        reply: Reply<Result<TimerSnapshot, TimerError>>,
    },
    /// A preset picked on the status surface
    SelectPreset {
        minutes: u32,
        reply: Reply<Result<TimerSnapshot, TimerError>>,
    },
    /// Pause the countdown
    Pause {
        reply: Reply<Result<TimerSnapshot, TimerError>>,
    },
    /// Resume the countdown
    Resume {
        reply: Reply<Result<TimerSnapshot, TimerError>>,
    },
    /// Stop the countdown
    Stop {
        reply: Reply<Result<TimerSnapshot, TimerError>>,
    },
    /// Query the current state
    Status { reply: Reply<TimerSnapshot> },
    /// Close the application and end the loop
    Close { reply: Reply<TimerSnapshot> },
}

// ============================================================================
// ControllerHandle
// ============================================================================

/// Cloneable sender side of the control task.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControllerHandle {
    /// Creates a handle and the receiver the control task reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControlMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, message: ControlMessage) -> Result<(), TimerError> {
        self.tx
            .send(message)
            .map_err(|_| TimerError::ControllerClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ControlMessage,
    ) -> Result<T, TimerError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| TimerError::ControllerClosed)
    }

    /// Queues a button press without waiting.
    pub fn button(&self, command: ButtonCommand) -> Result<(), TimerError> {
        self.send(ControlMessage::Button(command))
    }

    /// Queues a previous-chapter request without waiting.
    pub fn previous_chapter(&self) -> Result<(), TimerError> {
        self.send(ControlMessage::PreviousChapter)
    }

    pub async fn set_duration(&self, seconds: u64) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::SetDuration { seconds, reply })
            .await?
    }

    pub async fn select_preset(&self, minutes: u32) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::SelectPreset { minutes, reply })
            .await?
    }

    pub async fn pause(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::Resume { reply }).await?
    }

    pub async fn stop(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::Stop { reply }).await?
    }

    pub async fn status(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::Status { reply }).await
    }

    /// Asks the control task to close. Resolves once the close has been
    /// applied; use `closed()` to wait for the loop to end.
    pub async fn close(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(|reply| ControlMessage::Close { reply }).await
    }

    /// Returns true once the control task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the control task has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Owns the engine and runs the control loop.
pub struct Controller {
    engine: TimerEngine,
    rx: mpsc::UnboundedReceiver<ControlMessage>,
}

enum Flow {
    Continue,
    Shutdown,
}

impl Controller {
    pub fn new(engine: TimerEngine, rx: mpsc::UnboundedReceiver<ControlMessage>) -> Self {
        Self { engine, rx }
    }

    /// Creates a controller together with its handle.
    pub fn with_handle(engine: TimerEngine) -> (Self, ControllerHandle) {
        let (handle, rx) = ControllerHandle::channel();
        (Self::new(engine, rx), handle)
    }

    /// Runs until a close request arrives or every handle is dropped.
    ///
    /// Returns the engine so callers can inspect the final state.
    pub async fn run(mut self) -> TimerEngine {
        info!("control loop started");
        loop {
            let completion = self.engine.completion_deadline();
            let tick = self.engine.next_tick();

            tokio::select! {
                biased;

                _ = until(completion) => {
                    self.engine.on_completion(Instant::now());
                }
                message = self.rx.recv() => {
                    let Some(message) = message else {
                        debug!("all controller handles dropped");
                        break;
                    };
                    if let Flow::Shutdown = self.handle(message) {
                        break;
                    }
                }
                _ = until(tick) => {
                    self.engine.on_tick(Instant::now());
                }
            }
        }
        info!("control loop finished");
        self.engine
    }

    fn handle(&mut self, message: ControlMessage) -> Flow {
        let now = Instant::now();
        match message {
            ControlMessage::Button(command) => {
                let outcome = self.engine.handle_button(command, now);
                debug!(%command, ?outcome, "button handled");
            }
            ControlMessage::PreviousChapter => self.engine.previous_chapter(),
            ControlMessage::SetDuration { seconds, reply } => {
                let result = self.engine.change_duration(seconds, now);
                let _ = reply.send(result.map(|()| self.engine.snapshot(now)));
            }
            ControlMessage::SelectPreset { minutes, reply } => {
                let result = self.engine.select_preset(minutes, now);
                let _ = reply.send(result.map(|()| self.engine.snapshot(now)));
            }
            ControlMessage::Pause { reply } => {
                let result = self.engine.pause_timer(now);
                let _ = reply.send(result.map(|()| self.engine.snapshot(now)));
            }
            ControlMessage::Resume { reply } => {
                let result = self.engine.resume_timer(now);
                let _ = reply.send(result.map(|()| self.engine.snapshot(now)));
            }
            ControlMessage::Stop { reply } => {
                let result = self.engine.stop_timer(now);
                let _ = reply.send(result.map(|()| self.engine.snapshot(now)));
            }
            ControlMessage::Status { reply } => {
                let _ = reply.send(self.engine.snapshot(now));
            }
            ControlMessage::Close { reply } => {
                self.engine.close(now);
                let _ = reply.send(self.engine.snapshot(now));
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }
}

/// Sleeps until the deadline, or forever when there is none.
fn until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Duration;

    use crate::config::InMemoryDurationConfig;
    use crate::events::{MockEventSink, UiEvent};
    use crate::media::MediaSession;
    use crate::notification::{MockStatusSurface, STATUS_RUNNING};
    use crate::playback::{MockPlaybackControl, PlaybackOp};
    use crate::types::TimerPhase;

    struct Harness {
        handle: ControllerHandle,
        task: tokio::task::JoinHandle<TimerEngine>,
        playback: Arc<MockPlaybackControl>,
        events: Arc<MockEventSink>,
        surface: Arc<MockStatusSurface>,
    }

    fn spawn_controller(seconds: u64) -> Harness {
        let playback = Arc::new(MockPlaybackControl::new());
        let events = Arc::new(MockEventSink::new());
        let surface = Arc::new(MockStatusSurface::new());
        let engine = TimerEngine::new(
            Arc::new(InMemoryDurationConfig::new(seconds)),
            playback.clone(),
            events.clone(),
            surface.clone(),
            MediaSession::new(),
        );
        let (controller, handle) = Controller::with_handle(engine);
        let task = tokio::spawn(controller.run());
        Harness {
            handle,
            task,
            playback,
            events,
            surface,
        }
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    mod run_loop_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_full_run_completes_once() {
            let h = spawn_controller(10);

            h.handle.button(ButtonCommand::Play).unwrap();
            tokio::time::sleep(Duration::from_secs(15)).await;

            let snapshot = h.handle.status().await.unwrap();
            assert_eq!(snapshot.phase, TimerPhase::Idle);
            assert_eq!(h.events.count(&UiEvent::Completed), 1);
            assert_eq!(h.playback.count(PlaybackOp::Stop), 1);

            let ticks = h.surface.count_text(STATUS_RUNNING);
            assert!((9..=11).contains(&ticks), "ticks = {ticks}");
        }

        #[tokio::test(start_paused = true)]
        async fn test_duplicate_plays_do_not_duplicate_completion() {
            let h = spawn_controller(5);

            for _ in 0..3 {
                h.handle.button(ButtonCommand::Play).unwrap();
            }
            tokio::time::sleep(Duration::from_secs(20)).await;
            settle().await;

            assert_eq!(h.events.count(&UiEvent::Started), 1);
            assert_eq!(h.events.count(&UiEvent::Completed), 1);
            assert_eq!(h.playback.count(PlaybackOp::NudgePlay), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_duration_change_restarts_countdown() {
            let h = spawn_controller(15 * 60);
            let t0 = Instant::now();

            h.handle.button(ButtonCommand::Play).unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            h.handle.set_duration(5 * 60).await.unwrap();

            // would have fired at 4 minutes if reduced by elapsed time
            tokio::time::sleep_until(t0 + Duration::from_secs(60 + 4 * 60 + 30)).await;
            assert_eq!(h.events.count(&UiEvent::Completed), 0);

            tokio::time::sleep_until(t0 + Duration::from_secs(60 + 5 * 60 + 1)).await;
            settle().await;
            assert_eq!(h.events.count(&UiEvent::Completed), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_resume_fires_after_remaining() {
            let h = spawn_controller(100);
            let t0 = Instant::now();

            h.handle.button(ButtonCommand::Play).unwrap();
            tokio::time::sleep(Duration::from_secs(40)).await;
            let paused = h.handle.pause().await.unwrap();
            assert_eq!(paused.remaining_millis, 60_000);

            tokio::time::sleep(Duration::from_secs(500)).await;
            assert_eq!(h.events.count(&UiEvent::Completed), 0);

            h.handle.resume().await.unwrap();
            let resumed_at = Instant::now();
            assert_eq!(resumed_at - t0, Duration::from_secs(540));

            tokio::time::sleep_until(resumed_at + Duration::from_secs(59)).await;
            assert_eq!(h.events.count(&UiEvent::Completed), 0);

            tokio::time::sleep_until(resumed_at + Duration::from_secs(61)).await;
            settle().await;
            assert_eq!(h.events.count(&UiEvent::Completed), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_ticks_while_paused() {
            let h = spawn_controller(100);

            h.handle.button(ButtonCommand::Play).unwrap();
            tokio::time::sleep(Duration::from_millis(2500)).await;
            h.handle.pause().await.unwrap();
            let ticks = h.surface.count_text(STATUS_RUNNING);

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(h.surface.count_text(STATUS_RUNNING), ticks);
        }

        #[tokio::test(start_paused = true)]
        async fn test_explicit_errors_are_returned() {
            let h = spawn_controller(100);

            assert_eq!(h.handle.pause().await, Err(TimerError::NotRunning));
            assert_eq!(h.handle.resume().await, Err(TimerError::NotPaused));
            assert_eq!(h.handle.stop().await, Err(TimerError::NotActive));
            assert_eq!(
                h.handle.set_duration(0).await,
                Err(TimerError::InvalidDuration(0))
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_preset_and_previous_chapter() {
            let h = spawn_controller(100);

            let snapshot = h.handle.select_preset(30).await.unwrap();
            assert_eq!(snapshot.configured_duration_seconds, 1800);

            h.handle.previous_chapter().unwrap();
            settle().await;
            assert_eq!(h.playback.count(PlaybackOp::PreviousChapter), 1);
            assert_eq!(h.events.count(&UiEvent::PresetSelected { minutes: 30 }), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_close_ends_loop() {
            let h = spawn_controller(100);

            h.handle.button(ButtonCommand::Play).unwrap();
            let snapshot = h.handle.close().await.unwrap();
            assert_eq!(snapshot.phase, TimerPhase::Idle);

            h.handle.closed().await;
            let engine = h.task.await.unwrap();
            assert_eq!(engine.phase(), TimerPhase::Idle);
            assert!(h.handle.is_closed());
            assert_eq!(h.handle.status().await, Err(TimerError::ControllerClosed));
            assert_eq!(h.events.count(&UiEvent::CloseRequested), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_dropping_handles_ends_loop() {
            let h = spawn_controller(100);
            let task = h.task;
            drop(h.handle);

            let engine = task.await.unwrap();
            assert_eq!(engine.phase(), TimerPhase::Idle);
        }
    }
}
