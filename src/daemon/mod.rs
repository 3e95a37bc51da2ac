//! Daemon module for the sleep timer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: the `TimerEngine` state machine
//! - `controller`: the single control task serializing every input
//! - `ipc`: Unix socket bridge for the CLI and host UI

pub mod controller;
pub mod ipc;
pub mod timer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::InMemoryDurationConfig;
use crate::events::BroadcastEventSink;
use crate::media::{MediaButtonDispatcher, MediaSession};
use crate::notification::WatchStatusSurface;
use crate::playback::{
    CommandPlaybackTarget, ExternalPlaybackController, LoggingPlaybackTarget, PlaybackControl,
};
use crate::types::SleepTimerConfig;

pub use controller::{ControlMessage, Controller, ControllerHandle};
pub use ipc::{IpcServer, RequestHandler, WatchMessage};
pub use timer::{ButtonOutcome, TimerEngine, TimerError};

/// Builds the playback controller for the configured target.
///
/// Without any configured command, key events are only logged.
pub fn build_playback(config: &SleepTimerConfig, session: MediaSession) -> Arc<dyn PlaybackControl> {
    if config.launch_command.is_empty() && config.key_command.is_empty() {
        info!(package = %config.target_package, "no playback commands configured, dry run");
        let target = Arc::new(LoggingPlaybackTarget::new(config.target_package.clone()));
        return Arc::new(ExternalPlaybackController::new(target, session));
    }

    let target = Arc::new(CommandPlaybackTarget::new(
        config.target_package.clone(),
        config.launch_command.clone(),
        config.key_command.clone(),
    ));
    Arc::new(ExternalPlaybackController::new(target, session))
}

/// Runs the daemon until a close request or an interrupt.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the socket cannot
/// be bound.
pub async fn run_daemon(config: SleepTimerConfig, socket_path: PathBuf) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let session = MediaSession::new();
    let events = BroadcastEventSink::new();
    let surface = Arc::new(WatchStatusSurface::new());
    let engine = TimerEngine::new(
        Arc::new(InMemoryDurationConfig::from_config(&config)),
        build_playback(&config, session.clone()),
        Arc::new(events.clone()),
        surface.clone(),
        session.clone(),
    );

    let (controller, handle) = Controller::with_handle(engine);
    let control_task = tokio::spawn(controller.run());

    let dispatcher = Arc::new(MediaButtonDispatcher::new(session, handle.clone()));
    dispatcher.register();

    let server = IpcServer::new(&socket_path)?;
    info!(
        socket = %socket_path.display(),
        duration_minutes = config.duration_minutes,
        package = %config.target_package,
        "sleep timer daemon listening"
    );

    let handler = Arc::new(RequestHandler::new(
        dispatcher,
        handle.clone(),
        events,
        surface,
    ));

    tokio::select! {
        _ = ipc::serve(server, handler, handle.clone()) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("シグナルの待機に失敗しました")?;
            info!("interrupt received, shutting down");
            let _ = handle.close().await;
        }
    }

    control_task
        .await
        .context("タイマー制御タスクが異常終了しました")?;
    info!("sleep timer daemon stopped");
    Ok(())
}
