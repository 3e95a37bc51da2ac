//! Status surface implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::error::NotificationError;

/// One status line pushed to the surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub text: String,
    #[serde(rename = "remainingMillis")]
    pub remaining_millis: u64,
}

impl StatusUpdate {
    pub fn new(text: impl Into<String>, remaining_millis: u64) -> Self {
        Self {
            text: text.into(),
            remaining_millis,
        }
    }
}

/// The on-screen status indicator.
pub trait StatusSurface: Send + Sync {
    /// Replaces the displayed status.
    fn update_status(&self, text: &str, remaining_millis: u64) -> Result<(), NotificationError>;
}

// ============================================================================
// WatchStatusSurface
// ============================================================================

/// Status surface that publishes the latest update on a watch channel.
///
/// The latest value is kept even when no one is watching, so a late
/// observer sees the current status immediately. An update with no
/// observer attached still reports `SurfaceDetached`.
#[derive(Debug)]
pub struct WatchStatusSurface {
    tx: watch::Sender<Option<StatusUpdate>>,
}

impl Default for WatchStatusSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchStatusSurface {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Attaches an observer.
    pub fn subscribe(&self) -> watch::Receiver<Option<StatusUpdate>> {
        self.tx.subscribe()
    }

    /// Returns the last published status.
    pub fn current(&self) -> Option<StatusUpdate> {
        self.tx.borrow().clone()
    }
}

impl StatusSurface for WatchStatusSurface {
    fn update_status(&self, text: &str, remaining_millis: u64) -> Result<(), NotificationError> {
        tracing::debug!(text, remaining_millis, "status update");
        self.tx
            .send_replace(Some(StatusUpdate::new(text, remaining_millis)));
        if self.tx.receiver_count() == 0 {
            return Err(NotificationError::SurfaceDetached);
        }
        Ok(())
    }
}

// ============================================================================
// MockStatusSurface
// ============================================================================

/// Mock status surface for testing.
#[derive(Debug, Default)]
pub struct MockStatusSurface {
    updates: Mutex<Vec<StatusUpdate>>,
    should_fail: AtomicBool,
}

impl MockStatusSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Returns every accepted update in order.
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Counts accepted updates carrying `text`.
    pub fn count_text(&self, text: &str) -> usize {
        self.updates().iter().filter(|u| u.text == text).count()
    }

    pub fn last(&self) -> Option<StatusUpdate> {
        self.updates().last().cloned()
    }
}

impl StatusSurface for MockStatusSurface {
    fn update_status(&self, text: &str, remaining_millis: u64) -> Result<(), NotificationError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::UpdateFailed("mock failure".to_string()));
        }
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(StatusUpdate::new(text, remaining_millis));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_surface_keeps_latest() {
        let surface = WatchStatusSurface::new();
        assert!(surface.current().is_none());

        let err = surface.update_status("Timer Running", 5_000).unwrap_err();
        assert!(err.is_detached());
        let _ = surface.update_status("Timer Running", 4_000);

        assert_eq!(
            surface.current(),
            Some(StatusUpdate::new("Timer Running", 4_000))
        );
    }

    #[tokio::test]
    async fn test_watch_surface_notifies_subscriber() {
        let surface = WatchStatusSurface::new();
        let mut rx = surface.subscribe();

        surface.update_status("Timer Paused", 1_000).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().clone(),
            Some(StatusUpdate::new("Timer Paused", 1_000))
        );
    }

    #[test]
    fn test_watch_surface_attached_after_subscribe() {
        let surface = WatchStatusSurface::new();
        assert!(surface.update_status("Timer Running", 1_000).is_err());

        let rx = surface.subscribe();
        surface.update_status("Timer Running", 900).unwrap();
        assert_eq!(rx.borrow().clone(), Some(StatusUpdate::new("Timer Running", 900)));

        drop(rx);
        assert!(surface
            .update_status("Timer Running", 800)
            .unwrap_err()
            .is_detached());
    }

    #[test]
    fn test_mock_surface_failure() {
        let surface = MockStatusSurface::new();
        surface.set_should_fail(true);

        assert!(surface.update_status("Timer Running", 1).is_err());
        assert!(surface.updates().is_empty());

        surface.set_should_fail(false);
        surface.update_status("Timer Running", 1).unwrap();
        assert_eq!(surface.count_text("Timer Running"), 1);
    }

    #[test]
    fn test_status_update_serialize() {
        let json = serde_json::to_string(&StatusUpdate::new("Timer completed", 0)).unwrap();
        assert_eq!(json, r#"{"text":"Timer completed","remainingMillis":0}"#);
    }
}
