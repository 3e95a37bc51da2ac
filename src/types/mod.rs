//! Core data types for the sleep timer.
//!
//! This module defines the data structures used for:
//! - Timer phase and snapshots of the timer state
//! - Daemon configuration with validation
//! - IPC request/response serialization

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default timer duration in minutes.
pub const DEFAULT_DURATION_MINUTES: u32 = 15;

/// Longest duration the timer accepts, in minutes.
pub const MAX_DURATION_MINUTES: u32 = 999;

/// Presets offered on the status surface, in minutes.
pub const DEFAULT_PRESETS: [u32; 5] = [15, 20, 30, 45, 60];

/// Package identity of the external audio application.
pub const DEFAULT_TARGET_PACKAGE: &str = "com.audible.application";

// ============================================================================
// TimerPhase
// ============================================================================

/// Represents the current phase of the sleep timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// No countdown in progress
    #[default]
    Idle,
    /// Counting down towards completion
    Running,
    /// Countdown suspended with a remaining-time snapshot
    Paused,
    /// Countdown just finished; immediately re-enters Idle
    Completed,
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
            TimerPhase::Completed => "completed",
        }
    }

    /// Returns true if the countdown is active.
    pub fn is_running(&self) -> bool {
        matches!(self, TimerPhase::Running)
    }

    /// Returns true if a run is in progress, counting down or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, TimerPhase::Running | TimerPhase::Paused)
    }
}

// ============================================================================
// SleepTimerConfig
// ============================================================================

fn default_duration_minutes() -> u32 {
    DEFAULT_DURATION_MINUTES
}

fn default_presets() -> Vec<u32> {
    DEFAULT_PRESETS.to_vec()
}

fn default_target_package() -> String {
    DEFAULT_TARGET_PACKAGE.to_string()
}

/// Configuration for the sleep timer daemon.
///
/// Every field has a serde default, so a partial `config.json` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepTimerConfig {
    /// Timer duration in minutes (1-999)
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,

    /// Preset durations offered by the status surface, in minutes
    #[serde(default = "default_presets")]
    pub presets: Vec<u32>,

    /// Package identity of the external audio application
    #[serde(default = "default_target_package")]
    pub target_package: String,

    /// Command used to launch the external application.
    ///
    /// Empty means launching is not available on this host.
    #[serde(default)]
    pub launch_command: Vec<String>,

    /// Command used to deliver one key edge to the external application.
    ///
    /// Supports the `{package}`, `{key}`, `{code}` and `{edge}` placeholders.
    /// Empty means key events are only logged.
    #[serde(default)]
    pub key_command: Vec<String>,

    /// Socket path override for the daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
}

impl Default for SleepTimerConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            presets: default_presets(),
            target_package: default_target_package(),
            launch_command: Vec::new(),
            key_command: Vec::new(),
            socket_path: None,
        }
    }
}

impl SleepTimerConfig {
    /// Creates a new configuration with the specified duration.
    pub fn with_duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Creates a new configuration targeting another package.
    pub fn with_target_package(mut self, package: impl Into<String>) -> Self {
        self.target_package = package.into();
        self
    }

    /// Returns the configured duration in seconds.
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        validate_minutes(self.duration_minutes)?;
        if self.presets.is_empty() {
            return Err("プリセットを1つ以上指定してください".to_string());
        }
        for preset in &self.presets {
            validate_minutes(*preset)?;
        }
        if self.target_package.trim().is_empty() {
            return Err("対象アプリのパッケージ名が空です".to_string());
        }
        Ok(())
    }
}

/// Validates a duration given in minutes.
pub fn validate_minutes(minutes: u32) -> Result<(), String> {
    if minutes < 1 || minutes > MAX_DURATION_MINUTES {
        return Err(format!(
            "タイマー時間は1-{}分の範囲で指定してください",
            MAX_DURATION_MINUTES
        ));
    }
    Ok(())
}

// ============================================================================
// TimerSnapshot
// ============================================================================

/// Point-in-time view of the timer, produced on the control task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimerSnapshot {
    /// Current phase
    pub phase: TimerPhase,
    /// Remaining milliseconds of the current run (0 when idle)
    #[serde(rename = "remainingMillis")]
    pub remaining_millis: u64,
    /// Duration applicable to the current run
    #[serde(rename = "totalDurationMillis")]
    pub total_duration_millis: u64,
    /// Duration the next run will use
    #[serde(rename = "configuredDurationSeconds")]
    pub configured_duration_seconds: u64,
    /// Last text pushed to the status surface
    #[serde(rename = "statusText", skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

// ============================================================================
// IPC Types
// ============================================================================

/// Session-callback actions a host can deliver to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    /// onPlay
    Play,
    /// onPause
    Pause,
    /// onStop
    Stop,
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Raw media-button broadcast carrying a key code
    KeyEvent {
        /// Hardware key code
        code: u32,
        /// True for the release edge
        #[serde(default)]
        release: bool,
    },
    /// Session-callback style button event
    Session {
        /// Callback that fired
        action: SessionAction,
    },
    /// A volume-down key press
    VolumeDown,
    /// Change the configured duration
    Duration {
        /// New duration in minutes
        minutes: u32,
    },
    /// A preset was picked on the status surface
    Preset {
        /// Preset duration in minutes
        minutes: u32,
    },
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Stop the countdown
    Stop,
    /// Query the current status
    Status,
    /// Stream UI events until the client disconnects
    Watch,
    /// Close the application
    Close,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Remaining seconds, rounded up
    #[serde(rename = "remainingSeconds", skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    /// Configured duration in minutes
    #[serde(rename = "durationMinutes", skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u64>,
    /// Last status text
    #[serde(rename = "statusText", skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

impl ResponseData {
    /// Creates response data from a timer snapshot.
    pub fn from_snapshot(snapshot: &TimerSnapshot) -> Self {
        Self {
            state: Some(snapshot.phase.as_str().to_string()),
            remaining_seconds: Some(snapshot.remaining_millis.div_ceil(1000)),
            duration_minutes: Some(snapshot.configured_duration_seconds / 60),
            status_text: snapshot.status_text.clone(),
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for a success response.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================
