//! Media-button dispatch error types.

use thiserror::Error;

/// Errors that can occur while dispatching media-button events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The control task is no longer receiving commands.
    #[error("タイマー制御タスクが停止しているため、ボタン操作を処理できません")]
    ControllerClosed,
}

impl DispatchError {
    /// Returns true if the control task has gone away.
    #[must_use]
    pub fn is_controller_closed(&self) -> bool {
        matches!(self, Self::ControllerClosed)
    }

    /// Returns true if the daemon can keep serving other requests.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        false
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ControllerClosed => "デーモンを再起動してください: sleep-timer daemon",
        }
    }
}
