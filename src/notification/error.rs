//! Status surface error types.
//!
//! Status surface failures never affect the timer. They are logged by
//! `NotificationSync` and swallowed.

use thiserror::Error;

/// Errors that can occur while updating the status surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// No surface is attached to receive updates.
    #[error("ステータス表示先が接続されていません")]
    SurfaceDetached,

    /// The surface rejected the update.
    #[error("ステータスの更新に失敗しました: {0}")]
    UpdateFailed(String),
}

impl NotificationError {
    /// Returns true if no surface was attached.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::SurfaceDetached)
    }

    /// Returns true if the timer should carry on.
    ///
    /// The timer is authoritative, so every surface error is recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SurfaceDetached => "sleep-timer watch でステータスを表示できます",
            Self::UpdateFailed(_) => "表示側のアプリケーションを再起動してください",
        }
    }
}
