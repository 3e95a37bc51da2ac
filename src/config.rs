//! Configuration loading and the configured-duration store.
//!
//! The daemon reads `~/.sleep-timer/config.json` when present. CLI flags
//! override the file. The configured duration itself lives behind the
//! [`DurationConfig`] trait and is read at transition time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};

use crate::types::SleepTimerConfig;

/// Directory under the home directory holding config and socket.
pub const APP_DIR_NAME: &str = ".sleep-timer";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Socket file name.
pub const SOCKET_FILE_NAME: &str = "sleep-timer.sock";

/// Returns `~/.sleep-timer`, if a home directory is known.
pub fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR_NAME))
}

/// Returns the default config file path.
pub fn default_config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Returns the default socket path.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_socket_path() -> Result<PathBuf> {
    let dir = app_dir().context("ホームディレクトリが見つかりません")?;
    Ok(dir.join(SOCKET_FILE_NAME))
}

/// Loads the configuration from `path`, or the default location.
///
/// A missing file yields the defaults. An explicit path that does not
/// exist is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&Path>) -> Result<SleepTimerConfig> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(SleepTimerConfig::default()),
        },
    };

    if !path.exists() {
        if explicit {
            anyhow::bail!("設定ファイルが見つかりません: {}", path.display());
        }
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(SleepTimerConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("設定ファイルの読み込みに失敗しました: {}", path.display()))?;
    let config: SleepTimerConfig = serde_json::from_str(&content)
        .with_context(|| format!("設定ファイルの形式が正しくありません: {}", path.display()))?;
    config.validate().map_err(anyhow::Error::msg)?;

    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

// ============================================================================
// DurationConfig
// ============================================================================

/// Source of the configured timer duration.
pub trait DurationConfig: Send + Sync {
    /// Returns the duration the next run should use, in seconds.
    fn configured_duration_seconds(&self) -> u64;

    /// Replaces the configured duration.
    fn set_configured_duration_seconds(&self, seconds: u64);
}

/// In-memory duration store.
#[derive(Debug)]
pub struct InMemoryDurationConfig {
    seconds: AtomicU64,
}

impl InMemoryDurationConfig {
    pub fn new(seconds: u64) -> Self {
        Self {
            seconds: AtomicU64::new(seconds),
        }
    }

    pub fn from_config(config: &SleepTimerConfig) -> Self {
        Self::new(config.duration_seconds())
    }
}

impl Default for InMemoryDurationConfig {
    fn default() -> Self {
        Self::from_config(&SleepTimerConfig::default())
    }
}

impl DurationConfig for InMemoryDurationConfig {
    fn configured_duration_seconds(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }

    fn set_configured_duration_seconds(&self, seconds: u64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_under_home() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(".sleep-timer/config.json"));
        }
        if let Ok(path) = default_socket_path() {
            assert!(path.ends_with(".sleep-timer/sleep-timer.sock"));
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"duration_minutes": 30, "key_command": ["send", "{key}"]}"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.duration_minutes, 30);
        assert_eq!(config.key_command, vec!["send", "{key}"]);
        assert_eq!(config.target_package, "com.audible.application");
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("見つかりません"));
    }

    #[test]
    fn test_load_config_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("形式"));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"duration_minutes": 0}"#).unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("1-999"));
    }

    #[test]
    fn test_in_memory_duration_config() {
        let config = InMemoryDurationConfig::default();
        assert_eq!(config.configured_duration_seconds(), 900);

        config.set_configured_duration_seconds(300);
        assert_eq!(config.configured_duration_seconds(), 300);
    }
}
