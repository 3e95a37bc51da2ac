//! Component integration tests.
//!
//! These tests wire the dispatcher, the control task, the timer engine and
//! the real `ExternalPlaybackController` together, replacing only the
//! outermost collaborators with mocks:
//! - `MockPlaybackTarget` instead of the external application
//! - `MockEventSink` instead of the host UI
//! - `MockStatusSurface` instead of the notification surface
//!
//! All timing tests run on a paused clock.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};

use sleep_timer::config::InMemoryDurationConfig;
use sleep_timer::daemon::{Controller, ControllerHandle, TimerEngine};
use sleep_timer::events::{MockEventSink, UiEvent};
use sleep_timer::media::{
    ButtonCommand, DispatchOutcome, IgnoreReason, KeyCode, KeyEdge, KeyInput,
    MediaButtonDispatcher, MediaKey, MediaSession, SessionCallback,
};
use sleep_timer::notification::{MockStatusSurface, STATUS_COMPLETED, STATUS_RUNNING};
use sleep_timer::playback::{
    CommandPlaybackTarget, ExternalPlaybackController, MockPlaybackTarget, PlaybackTarget,
    TargetCall,
};
use sleep_timer::types::TimerPhase;

// ============================================================================
// Test Helpers
// ============================================================================

struct Stack {
    dispatcher: MediaButtonDispatcher,
    handle: ControllerHandle,
    session: MediaSession,
    target: Arc<MockPlaybackTarget>,
    events: Arc<MockEventSink>,
    surface: Arc<MockStatusSurface>,
    task: JoinHandle<TimerEngine>,
}

/// Builds the full in-process stack with a registered dispatcher.
fn build_stack(duration_seconds: u64) -> Stack {
    let session = MediaSession::new();
    let target = Arc::new(MockPlaybackTarget::new());
    let events = Arc::new(MockEventSink::new());
    let surface = Arc::new(MockStatusSurface::new());

    let playback = Arc::new(ExternalPlaybackController::new(
        target.clone(),
        session.clone(),
    ));
    let engine = TimerEngine::new(
        Arc::new(InMemoryDurationConfig::new(duration_seconds)),
        playback,
        events.clone(),
        surface.clone(),
        session.clone(),
    );
    let (controller, handle) = Controller::with_handle(engine);
    let task = tokio::spawn(controller.run());

    let dispatcher = MediaButtonDispatcher::new(session.clone(), handle.clone());
    assert!(dispatcher.register());

    Stack {
        dispatcher,
        handle,
        session,
        target,
        events,
        surface,
        task,
    }
}

fn press(code: KeyCode) -> Option<KeyInput> {
    Some(KeyInput::press(code))
}

/// Offset of each recorded target call from `origin`, in milliseconds.
fn call_offsets(target: &MockPlaybackTarget, origin: Instant) -> Vec<(u64, TargetCall)> {
    target
        .timed_calls()
        .into_iter()
        .map(|(at, call)| (at.duration_since(origin).as_millis() as u64, call))
        .collect()
}

// ============================================================================
// Dispatcher → Controller → Engine
// ============================================================================

mod dispatch_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_play_press_starts_run_and_emits_in_order() {
        let stack = build_stack(900);

        let outcome = stack.dispatcher.on_broadcast(press(KeyCode::PlayPause)).unwrap();
        assert_eq!(outcome, DispatchOutcome::Forwarded(ButtonCommand::Play));

        let snapshot = stack.handle.status().await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Running);
        assert_eq!(snapshot.total_duration_millis, 900_000);
        assert_eq!(
            stack.events.events(),
            vec![
                UiEvent::ButtonPressed {
                    command: ButtonCommand::Play
                },
                UiEvent::Started,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_dispatcher_drops_everything() {
        let session = MediaSession::new();
        let (handle, mut rx) = ControllerHandle::channel();
        let dispatcher = MediaButtonDispatcher::new(session, handle);

        let outcome = dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::NotRegistered));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_callbacks_and_broadcasts_agree() {
        let stack = build_stack(900);

        let via_callback = stack
            .dispatcher
            .on_session_callback(SessionCallback::Play)
            .unwrap();
        assert_eq!(via_callback, DispatchOutcome::Forwarded(ButtonCommand::Play));

        // let the start sequence finish so the claim is held again
        sleep(Duration::from_secs(3)).await;

        let via_broadcast = stack.dispatcher.on_broadcast(press(KeyCode::Stop)).unwrap();
        assert_eq!(via_broadcast, DispatchOutcome::Forwarded(ButtonCommand::Pause));

        stack.handle.status().await.unwrap();
        assert_eq!(
            stack.events.count(&UiEvent::ButtonPressed {
                command: ButtonCommand::Pause
            }),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_is_ignored() {
        let stack = build_stack(900);

        let outcome = stack.dispatcher.on_broadcast(None).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::MissingKey));

        let snapshot = stack.handle.status().await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Idle);
        assert!(stack.events.events().is_empty());
    }
}

// ============================================================================
// Engine → ExternalPlaybackController → target
// ============================================================================

mod playback_flow_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_sequence_timing() {
        let stack = build_stack(900);
        let origin = Instant::now();

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(3)).await;

        assert_eq!(
            call_offsets(&stack.target, origin),
            vec![
                (0, TargetCall::Launch),
                (1700, TargetCall::Key(MediaKey::Play, KeyEdge::Down)),
                (1750, TargetCall::Key(MediaKey::Play, KeyEdge::Up)),
            ]
        );
        assert!(stack.session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_presses_during_sequence_belong_to_external_app() {
        let stack = build_stack(900);
        let origin = Instant::now();

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();

        sleep_until(origin + Duration::from_millis(1600)).await;
        assert!(!stack.session.is_active());
        let outcome = stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::SessionReleased));

        sleep_until(origin + Duration::from_millis(2800)).await;
        assert!(stack.session.is_active());
        let outcome = stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        assert_eq!(outcome, DispatchOutcome::Forwarded(ButtonCommand::Play));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_play_nudges_without_launch() {
        let stack = build_stack(900);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(3)).await;
        stack.dispatcher.on_broadcast(press(KeyCode::PlayAlias)).unwrap();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(stack.target.launch_count(), 1);
        assert_eq!(stack.target.key_presses(MediaKey::Play), 2);
        assert_eq!(stack.handle.status().await.unwrap().phase, TimerPhase::Running);
        assert_eq!(stack.events.count(&UiEvent::Started), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_button_pauses_playback_only() {
        let stack = build_stack(900);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(3)).await;
        stack
            .dispatcher
            .on_session_callback(SessionCallback::Pause)
            .unwrap();
        sleep(Duration::from_secs(3)).await;

        assert_eq!(stack.target.key_presses(MediaKey::Pause), 1);
        assert_eq!(stack.target.key_presses(MediaKey::Stop), 0);
        assert_eq!(stack.handle.status().await.unwrap().phase, TimerPhase::Running);
        assert!(stack.session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_sends_pause_then_stop() {
        let stack = build_stack(10);
        let origin = Instant::now();

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();

        sleep_until(origin + Duration::from_millis(11_000)).await;
        assert!(!stack.session.is_active());
        assert_eq!(stack.events.count(&UiEvent::Completed), 1);

        sleep_until(origin + Duration::from_millis(13_000)).await;
        assert!(stack.session.is_active());

        let stop_keys: Vec<_> = call_offsets(&stack.target, origin)
            .into_iter()
            .filter(|(at, _)| *at >= 10_000)
            .collect();
        assert_eq!(
            stop_keys,
            vec![
                (10_200, TargetCall::Key(MediaKey::Pause, KeyEdge::Down)),
                (10_250, TargetCall::Key(MediaKey::Pause, KeyEdge::Up)),
                (10_350, TargetCall::Key(MediaKey::Stop, KeyEdge::Down)),
                (10_400, TargetCall::Key(MediaKey::Stop, KeyEdge::Up)),
            ]
        );

        let snapshot = stack.handle.status().await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Idle);
        assert_eq!(snapshot.status_text.as_deref(), Some(STATUS_COMPLETED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_after_completion() {
        let stack = build_stack(5);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(10)).await;
        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(stack.target.launch_count(), 2);
        assert_eq!(stack.events.count(&UiEvent::Started), 2);
        assert_eq!(stack.events.count(&UiEvent::Completed), 1);
        assert_eq!(stack.handle.status().await.unwrap().phase, TimerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_down_double_press_sends_previous() {
        let stack = build_stack(900);

        assert!(!stack.dispatcher.on_volume_down(Instant::now()).unwrap());
        sleep(Duration::from_millis(300)).await;
        assert!(stack.dispatcher.on_volume_down(Instant::now()).unwrap());
        sleep(Duration::from_secs(2)).await;

        assert_eq!(stack.target.key_presses(MediaKey::Previous), 1);
        assert_eq!(stack.target.launch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_target_does_not_disturb_timer() {
        let stack = build_stack(900);
        stack.target.set_should_fail_launch(true);
        stack.target.set_should_fail_keys(true);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(5)).await;

        // every step was still attempted, and the claim came back
        assert_eq!(stack.target.launch_count(), 1);
        assert_eq!(stack.target.key_presses(MediaKey::Play), 1);
        assert!(stack.session.is_active());
        assert_eq!(stack.handle.status().await.unwrap().phase, TimerPhase::Running);
    }
}

// ============================================================================
// Engine → NotificationSync → surface
// ============================================================================

mod notification_flow_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_stop_while_paused() {
        let stack = build_stack(60);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_millis(5_500)).await;
        stack.handle.pause().await.unwrap();
        let ticks_at_pause = stack.surface.count_text(STATUS_RUNNING);
        assert!((5..=7).contains(&ticks_at_pause), "ticks = {ticks_at_pause}");

        sleep(Duration::from_secs(30)).await;
        assert_eq!(stack.surface.count_text(STATUS_RUNNING), ticks_at_pause);

        stack.handle.resume().await.unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert!(stack.surface.count_text(STATUS_RUNNING) > ticks_at_pause);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_updates_count_down() {
        let stack = build_stack(30);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_millis(3_500)).await;

        let remaining: Vec<u64> = stack
            .surface
            .updates()
            .into_iter()
            .filter(|u| u.text == STATUS_RUNNING)
            .map(|u| u.remaining_millis)
            .collect();
        assert!(remaining.len() >= 3);
        assert!(remaining.windows(2).all(|w| w[0] > w[1]));
        assert!(remaining[0] <= 30_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_finishes_control_task() {
        let stack = build_stack(60);

        stack.dispatcher.on_broadcast(press(KeyCode::Play)).unwrap();
        sleep(Duration::from_secs(1)).await;
        stack.handle.close().await.unwrap();

        let engine = stack.task.await.unwrap();
        assert_eq!(engine.phase(), TimerPhase::Idle);
        assert!(engine.completion_deadline().is_none());
        assert!(stack.events.events().contains(&UiEvent::CloseRequested));

        // a closed controller surfaces as a dispatch error
        sleep(Duration::from_secs(3)).await;
        assert!(stack.dispatcher.on_broadcast(press(KeyCode::Play)).is_err());
    }
}

// ============================================================================
// CommandPlaybackTarget
// ============================================================================

mod command_target_tests {
    use super::*;

    async fn wait_for_lines(path: &std::path::Path, count: usize) -> Vec<String> {
        for _ in 0..100 {
            if let Ok(content) = std::fs::read_to_string(path) {
                let lines: Vec<String> = content.lines().map(str::to_string).collect();
                if lines.len() >= count {
                    return lines;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("command output did not appear in {:?}", path);
    }

    #[tokio::test]
    async fn test_key_command_receives_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("keys.log");
        let script = format!("echo {{package}} {{key}} {{code}} {{edge}} >> {}", out.display());

        let target = CommandPlaybackTarget::new(
            "org.example.player",
            Vec::new(),
            vec!["sh".to_string(), "-c".to_string(), script],
        );

        target.send_key(MediaKey::Play, KeyEdge::Down).unwrap();
        let lines = wait_for_lines(&out, 1).await;
        assert_eq!(lines[0], "org.example.player MEDIA_PLAY 126 down");
    }

    #[tokio::test]
    async fn test_launch_command_runs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("launch.log");
        let script = format!("echo launched {{package}} >> {}", out.display());

        let target = CommandPlaybackTarget::new(
            "org.example.player",
            vec!["sh".to_string(), "-c".to_string(), script],
            Vec::new(),
        );

        target.launch().unwrap();
        let lines = wait_for_lines(&out, 1).await;
        assert_eq!(lines[0], "launched org.example.player");

        let err = target.send_key(MediaKey::Pause, KeyEdge::Down).unwrap_err();
        assert!(err.is_unconfigured());
    }

    /// 起動したアプリはキーコマンドのタイムアウトを過ぎても動き続ける
    #[tokio::test]
    async fn test_launched_app_outlives_command_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("app.log");
        let script = format!("sleep 6; echo still-running >> {}", out.display());

        let target = CommandPlaybackTarget::new(
            "org.example.player",
            vec!["sh".to_string(), "-c".to_string(), script],
            Vec::new(),
        );

        target.launch().unwrap();

        for _ in 0..200 {
            if let Ok(content) = std::fs::read_to_string(&out) {
                if content.contains("still-running") {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("launched app was killed before it finished");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let target = CommandPlaybackTarget::new(
            "org.example.player",
            vec!["/nonexistent/sleep-timer-launcher".to_string()],
            Vec::new(),
        );
        assert!(target.launch().is_err());
    }
}
