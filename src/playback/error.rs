//! External playback error types.
//!
//! Every step of a playback sequence is guarded independently. These errors
//! are logged and the sequence continues with its next step.

use thiserror::Error;

/// Errors that can occur while signalling the external application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// No launch command is configured.
    #[error("対象アプリ '{0}' の起動コマンドが設定されていません")]
    LaunchUnavailable(String),

    /// No key command is configured.
    #[error("対象アプリ '{0}' へのキー送信コマンドが設定されていません")]
    KeyCommandUnavailable(String),

    /// The command could not be spawned.
    #[error("コマンド '{0}' の起動に失敗しました: {1}")]
    SpawnFailed(String, String),

    /// The target refused the step.
    #[error("対象アプリへの送信に失敗しました: {0}")]
    Rejected(String),
}

impl PlaybackError {
    /// Returns true if the failure comes from missing configuration.
    #[must_use]
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, Self::LaunchUnavailable(_) | Self::KeyCommandUnavailable(_))
    }

    /// Returns true if the sequence should continue.
    ///
    /// The external application is best-effort, so every playback error is
    /// recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::LaunchUnavailable(_) => {
                "config.json の launch_command に起動コマンドを設定してください"
            }
            Self::KeyCommandUnavailable(_) => {
                "config.json の key_command にキー送信コマンドを設定してください"
            }
            Self::SpawnFailed(_, _) => "コマンドのパスと実行権限を確認してください",
            Self::Rejected(_) => "対象アプリが起動しているか確認してください",
        }
    }
}
