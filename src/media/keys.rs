//! Key codes and the media-button classifier.
//!
//! Raw codes follow the numbering the hardware reports. Classification is a
//! pure function of the key and its edge.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Raw key codes
// ============================================================================

/// Raw code for the volume-down key.
pub const RAW_VOLUME_DOWN: u32 = 25;
/// Raw code for media play/pause.
pub const RAW_PLAY_PAUSE: u32 = 85;
/// Raw code for media stop.
pub const RAW_STOP: u32 = 86;
/// Raw code for media previous.
pub const RAW_PREVIOUS: u32 = 88;
/// Raw code for media play.
pub const RAW_PLAY: u32 = 126;
/// Vendor-specific alias reported by some headsets for play.
pub const RAW_PLAY_ALIAS: u32 = 127;

// ============================================================================
// KeyCode
// ============================================================================

/// A hardware key as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Media play
    Play,
    /// Media play/pause toggle
    PlayPause,
    /// Vendor alias that behaves as play
    PlayAlias,
    /// Media pause (only reachable through session callbacks)
    Pause,
    /// Media stop
    Stop,
    /// Media previous
    Previous,
    /// Volume down
    VolumeDown,
    /// Any other code
    Other(u32),
}

impl KeyCode {
    /// Maps a raw hardware code to a key.
    ///
    /// The play set is matched before the pause set, so 127 always resolves
    /// to the play alias.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            RAW_PLAY => KeyCode::Play,
            RAW_PLAY_PAUSE => KeyCode::PlayPause,
            RAW_PLAY_ALIAS => KeyCode::PlayAlias,
            RAW_STOP => KeyCode::Stop,
            RAW_PREVIOUS => KeyCode::Previous,
            RAW_VOLUME_DOWN => KeyCode::VolumeDown,
            other => KeyCode::Other(other),
        }
    }

    /// Returns the raw hardware code.
    pub fn raw(&self) -> u32 {
        match self {
            KeyCode::Play => RAW_PLAY,
            KeyCode::PlayPause => RAW_PLAY_PAUSE,
            KeyCode::PlayAlias | KeyCode::Pause => RAW_PLAY_ALIAS,
            KeyCode::Stop => RAW_STOP,
            KeyCode::Previous => RAW_PREVIOUS,
            KeyCode::VolumeDown => RAW_VOLUME_DOWN,
            KeyCode::Other(raw) => *raw,
        }
    }
}

// ============================================================================
// KeyEdge / KeyInput
// ============================================================================

/// Press or release edge of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEdge {
    /// Key pressed
    Down,
    /// Key released
    Up,
}

impl KeyEdge {
    /// Returns the edge name used in outbound commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyEdge::Down => "down",
            KeyEdge::Up => "up",
        }
    }

    /// Builds an edge from a press flag.
    pub fn from_press(is_press: bool) -> Self {
        if is_press {
            KeyEdge::Down
        } else {
            KeyEdge::Up
        }
    }
}

/// One key event: a key plus its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub code: KeyCode,
    pub edge: KeyEdge,
}

impl KeyInput {
    /// Creates a press event.
    pub fn press(code: KeyCode) -> Self {
        Self {
            code,
            edge: KeyEdge::Down,
        }
    }

    /// Creates a release event.
    pub fn release(code: KeyCode) -> Self {
        Self {
            code,
            edge: KeyEdge::Up,
        }
    }

    /// Creates an event from a raw code and a press flag.
    pub fn from_raw(raw: u32, is_press: bool) -> Self {
        Self {
            code: KeyCode::from_raw(raw),
            edge: KeyEdge::from_press(is_press),
        }
    }
}

// ============================================================================
// ButtonCommand
// ============================================================================

/// Semantic command produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonCommand {
    Play,
    Pause,
}

impl fmt::Display for ButtonCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonCommand::Play => write!(f, "play"),
            ButtonCommand::Pause => write!(f, "pause"),
        }
    }
}

/// Classifies a key event.
///
/// Release edges and keys outside the play/pause sets yield `None`.
pub fn classify(input: KeyInput) -> Option<ButtonCommand> {
    if input.edge != KeyEdge::Down {
        return None;
    }
    match input.code {
        KeyCode::Play | KeyCode::PlayPause | KeyCode::PlayAlias => Some(ButtonCommand::Play),
        KeyCode::Pause | KeyCode::Stop => Some(ButtonCommand::Pause),
        KeyCode::Previous | KeyCode::VolumeDown | KeyCode::Other(_) => None,
    }
}

// ============================================================================
// MediaKey
// ============================================================================

/// Key transmitted to the external application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKey {
    Play,
    Pause,
    Stop,
    Previous,
}

impl MediaKey {
    /// Returns the key name used by the `{key}` placeholder.
    pub fn name(&self) -> &'static str {
        match self {
            MediaKey::Play => "MEDIA_PLAY",
            MediaKey::Pause => "MEDIA_PAUSE",
            MediaKey::Stop => "MEDIA_STOP",
            MediaKey::Previous => "MEDIA_PREVIOUS",
        }
    }

    /// Returns the raw code used by the `{code}` placeholder.
    pub fn code(&self) -> u32 {
        match self {
            MediaKey::Play => RAW_PLAY,
            MediaKey::Pause => RAW_PLAY_ALIAS,
            MediaKey::Stop => RAW_STOP,
            MediaKey::Previous => RAW_PREVIOUS,
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Tests
// ============================================================================
