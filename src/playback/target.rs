//! Transports that deliver playback steps to the external application.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::process::Command;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};

use crate::media::{KeyEdge, MediaKey};

use super::error::PlaybackError;

/// Longest time a key command may run before it is killed.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers launch and key requests to the external application.
///
/// Calls must not block: the sequence timing depends on them returning
/// promptly.
pub trait PlaybackTarget: Send + Sync + 'static {
    /// Attempts to launch the external application.
    fn launch(&self) -> Result<(), PlaybackError>;

    /// Sends one key edge addressed to the external application.
    fn send_key(&self, key: MediaKey, edge: KeyEdge) -> Result<(), PlaybackError>;
}

// ============================================================================
// CommandPlaybackTarget
// ============================================================================

/// Target that runs configured commands for each request.
///
/// Command arguments may contain `{package}`, `{key}`, `{code}` and `{edge}`
/// placeholders. Commands are spawned and not awaited; exit status is
/// logged from a background task. Only key commands are bounded by a
/// timeout; the launched application is left running.
#[derive(Debug, Clone)]
pub struct CommandPlaybackTarget {
    package: String,
    launch_command: Vec<String>,
    key_command: Vec<String>,
}

impl CommandPlaybackTarget {
    pub fn new(
        package: impl Into<String>,
        launch_command: Vec<String>,
        key_command: Vec<String>,
    ) -> Self {
        Self {
            package: package.into(),
            launch_command,
            key_command,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Substitutes placeholders in a command template.
    pub fn render(&self, template: &[String], key: Option<(MediaKey, KeyEdge)>) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                let mut arg = arg.replace("{package}", &self.package);
                if let Some((key, edge)) = key {
                    arg = arg
                        .replace("{key}", key.name())
                        .replace("{code}", &key.code().to_string())
                        .replace("{edge}", edge.as_str());
                }
                arg
            })
            .collect()
    }

    fn command(argv: &[String]) -> Result<(String, Command), PlaybackError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(PlaybackError::Rejected("empty command".to_string()));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Ok((program.clone(), command))
    }

    /// Spawns a short key command, killed if it outlives `COMMAND_TIMEOUT`.
    fn spawn_key_command(&self, argv: Vec<String>) -> Result<(), PlaybackError> {
        let (program, mut command) = Self::command(&argv)?;
        let mut child = command
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::SpawnFailed(program.clone(), e.to_string()))?;

        tokio::spawn(async move {
            match timeout(COMMAND_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    debug!(program = %program, "playback command finished");
                }
                Ok(Ok(status)) => {
                    warn!(program = %program, %status, "playback command exited with failure");
                }
                Ok(Err(e)) => {
                    warn!(program = %program, error = %e, "failed to wait for playback command");
                }
                Err(_) => {
                    warn!(program = %program, "playback command timed out and was killed");
                }
            }
        });

        Ok(())
    }

    /// Spawns the launch command. The external application is never killed
    /// from here; the child is only reaped.
    fn spawn_launch_command(&self, argv: Vec<String>) -> Result<(), PlaybackError> {
        let (program, mut command) = Self::command(&argv)?;
        let mut child = command
            .spawn()
            .map_err(|e| PlaybackError::SpawnFailed(program.clone(), e.to_string()))?;

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(program = %program, "launch command exited");
                }
                Ok(status) => {
                    warn!(program = %program, %status, "launch command exited with failure");
                }
                Err(e) => {
                    warn!(program = %program, error = %e, "failed to wait for launch command");
                }
            }
        });

        Ok(())
    }
}

impl PlaybackTarget for CommandPlaybackTarget {
    fn launch(&self) -> Result<(), PlaybackError> {
        if self.launch_command.is_empty() {
            return Err(PlaybackError::LaunchUnavailable(self.package.clone()));
        }
        info!("対象アプリを起動します: {}", self.package);
        self.spawn_launch_command(self.render(&self.launch_command, None))
    }

    fn send_key(&self, key: MediaKey, edge: KeyEdge) -> Result<(), PlaybackError> {
        if self.key_command.is_empty() {
            return Err(PlaybackError::KeyCommandUnavailable(self.package.clone()));
        }
        self.spawn_key_command(self.render(&self.key_command, Some((key, edge))))
    }
}

// ============================================================================
// LoggingPlaybackTarget
// ============================================================================

/// Dry-run target that only logs what would be sent.
#[derive(Debug, Clone)]
pub struct LoggingPlaybackTarget {
    package: String,
}

impl LoggingPlaybackTarget {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
        }
    }
}

impl PlaybackTarget for LoggingPlaybackTarget {
    fn launch(&self) -> Result<(), PlaybackError> {
        info!(package = %self.package, "launch (dry run)");
        Ok(())
    }

    fn send_key(&self, key: MediaKey, edge: KeyEdge) -> Result<(), PlaybackError> {
        info!(package = %self.package, %key, edge = edge.as_str(), "key event (dry run)");
        Ok(())
    }
}

// ============================================================================
// MockPlaybackTarget
// ============================================================================

/// A request observed by [`MockPlaybackTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCall {
    Launch,
    Key(MediaKey, KeyEdge),
}

/// Mock target for testing. Records each call with the time it happened.
#[derive(Debug, Default)]
pub struct MockPlaybackTarget {
    calls: Mutex<Vec<(Instant, TargetCall)>>,
    should_fail_launch: AtomicBool,
    should_fail_keys: AtomicBool,
}

impl MockPlaybackTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail_launch(&self, should_fail: bool) {
        self.should_fail_launch.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_should_fail_keys(&self, should_fail: bool) {
        self.should_fail_keys.store(should_fail, Ordering::SeqCst);
    }

    /// Returns all calls with timestamps.
    pub fn timed_calls(&self) -> Vec<(Instant, TargetCall)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns all calls in order.
    pub fn calls(&self) -> Vec<TargetCall> {
        self.timed_calls().into_iter().map(|(_, call)| call).collect()
    }

    /// Counts key-down edges for `key`.
    pub fn key_presses(&self, key: MediaKey) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == TargetCall::Key(key, KeyEdge::Down))
            .count()
    }

    pub fn launch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == TargetCall::Launch)
            .count()
    }

    fn record(&self, call: TargetCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((Instant::now(), call));
    }
}

impl PlaybackTarget for MockPlaybackTarget {
    fn launch(&self) -> Result<(), PlaybackError> {
        self.record(TargetCall::Launch);
        if self.should_fail_launch.load(Ordering::SeqCst) {
            return Err(PlaybackError::LaunchUnavailable("mock".to_string()));
        }
        Ok(())
    }

    fn send_key(&self, key: MediaKey, edge: KeyEdge) -> Result<(), PlaybackError> {
        self.record(TargetCall::Key(key, edge));
        if self.should_fail_keys.load(Ordering::SeqCst) {
            return Err(PlaybackError::Rejected("mock".to_string()));
        }
        Ok(())
    }
}
