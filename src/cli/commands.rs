//! Command definitions for the sleep timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::media::keys::{RAW_PLAY, RAW_PLAY_PAUSE, RAW_PREVIOUS, RAW_STOP};
use crate::types::{IpcRequest, SessionAction, MAX_DURATION_MINUTES};

// ============================================================================
// CLI Structure
// ============================================================================

/// Sleep timer driven by media buttons
#[derive(Parser, Debug)]
#[command(
    name = "sleep-timer",
    version,
    about = "メディアボタンで操作するスリープタイマー",
    long_about = "メディアボタンでスリープタイマーを開始し、時間になると外部の再生アプリを一時停止します。\n\
                  デーモンを起動してから press / status などのコマンドで操作します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Socket path of the daemon
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the daemon in the foreground
    Daemon(DaemonArgs),

    /// Simulate a media button press
    Press(PressArgs),

    /// Simulate a volume-down key press
    VolumeDown,

    /// Set the timer duration in minutes
    Duration {
        /// Duration in minutes (1-999)
        #[arg(value_parser = clap::value_parser!(u32).range(1..=MAX_DURATION_MINUTES as i64))]
        minutes: u32,
    },

    /// Select a preset duration in minutes
    Preset {
        /// Preset in minutes (1-999)
        #[arg(value_parser = clap::value_parser!(u32).range(1..=MAX_DURATION_MINUTES as i64))]
        minutes: u32,
    },

    /// Pause the countdown
    Pause,

    /// Resume a paused countdown
    Resume,

    /// Stop the countdown
    Stop,

    /// Show current timer status
    Status,

    /// Stream timer events
    Watch,

    /// Close the application (stops the daemon)
    Close,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Daemon Arguments
// ============================================================================

/// Arguments for the daemon command
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Timer duration in minutes (1-999), overrides the config file
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u32).range(1..=MAX_DURATION_MINUTES as i64)
    )]
    pub duration: Option<u32>,

    /// Package identity of the external audio application
    #[arg(short, long, value_parser = validate_package)]
    pub package: Option<String>,

    /// Config file path (default: ~/.sleep-timer/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Press Arguments
// ============================================================================

/// Named media keys
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKey {
    /// Media play
    Play,
    /// Media pause (delivered as a session callback)
    Pause,
    /// Media stop
    Stop,
    /// Media play/pause
    PlayPause,
    /// Media previous
    Previous,
}

/// Arguments for the press command
#[derive(Args, Debug, Clone)]
pub struct PressArgs {
    /// Key to press
    #[arg(value_enum, required_unless_present = "raw")]
    pub key: Option<PressKey>,

    /// Raw hardware key code, sent as a broadcast
    #[arg(long, conflicts_with = "key")]
    pub raw: Option<u32>,

    /// Send the release edge instead of the press edge
    #[arg(long)]
    pub release: bool,
}

impl PressArgs {
    /// Converts the arguments into the IPC request.
    pub fn to_request(&self) -> IpcRequest {
        if let Some(code) = self.raw {
            return IpcRequest::KeyEvent {
                code,
                release: self.release,
            };
        }

        let code = match self.key.unwrap_or(PressKey::Play) {
            // session callbacks carry no edge
            PressKey::Pause => {
                return IpcRequest::Session {
                    action: SessionAction::Pause,
                }
            }
            PressKey::Play => RAW_PLAY,
            PressKey::Stop => RAW_STOP,
            PressKey::PlayPause => RAW_PLAY_PAUSE,
            PressKey::Previous => RAW_PREVIOUS,
        };

        IpcRequest::KeyEvent {
            code,
            release: self.release,
        }
    }
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates the package identity.
///
/// - Must not be empty
/// - Must not contain whitespace
fn validate_package(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("パッケージ名は空にできません".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err("パッケージ名に空白は使えません".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
