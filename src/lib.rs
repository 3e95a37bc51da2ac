//! Media-button sleep timer library
//!
//! A countdown timer armed by headset/media buttons that pauses an
//! external audio application when it runs out. It includes:
//! - Key classification and the media-button dispatcher
//! - The timer engine and its single control task
//! - Scripted key sequences sent to the external audio application
//! - Periodic status surface updates
//! - UI event relay
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities

pub mod cli;
pub mod config;
pub mod daemon;
pub mod events;
pub mod media;
pub mod notification;
pub mod playback;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    IpcRequest, IpcResponse, ResponseData, SessionAction, SleepTimerConfig, TimerPhase,
    TimerSnapshot,
};

pub use daemon::{Controller, ControllerHandle, TimerEngine, TimerError};
pub use events::{BroadcastEventSink, EventSink, UiEvent};
pub use media::{ButtonCommand, KeyCode, KeyInput, MediaButtonDispatcher, MediaSession};
pub use notification::{NotificationSync, StatusSurface, StatusUpdate};
pub use playback::{ExternalPlaybackController, PlaybackControl, PlaybackTarget};
