//! UI event relay.
//!
//! Events are fire-and-forget: the sink never blocks and silently drops
//! events when no UI is attached.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::media::ButtonCommand;

/// Capacity of the broadcast channel feeding watchers.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// UiEvent
// ============================================================================

/// Named events delivered to the host UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum UiEvent {
    /// A new run started
    Started,
    /// The countdown was paused
    Paused,
    /// The countdown was resumed
    Resumed,
    /// The countdown reached zero
    Completed,
    /// The countdown was stopped
    Stopped,
    /// A running countdown restarted with a new duration
    DurationUpdated {
        /// New duration in seconds
        seconds: u64,
    },
    /// A media button press was classified
    ButtonPressed {
        /// Classified command
        command: ButtonCommand,
    },
    /// A preset was picked on the status surface
    PresetSelected {
        /// Preset in minutes
        minutes: u32,
    },
    /// The host asked the application to close
    CloseRequested,
}

impl UiEvent {
    /// Returns the event name as sent to the UI.
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::Started => "started",
            UiEvent::Paused => "paused",
            UiEvent::Resumed => "resumed",
            UiEvent::Completed => "completed",
            UiEvent::Stopped => "stopped",
            UiEvent::DurationUpdated { .. } => "durationUpdated",
            UiEvent::ButtonPressed { .. } => "buttonPressed",
            UiEvent::PresetSelected { .. } => "presetSelected",
            UiEvent::CloseRequested => "closeRequested",
        }
    }
}

// ============================================================================
// EventSink
// ============================================================================

/// Destination for UI events.
pub trait EventSink: Send + Sync {
    /// Emits an event without waiting for delivery.
    fn emit(&self, event: UiEvent);
}

/// Event sink backed by a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<UiEvent>,
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEventSink {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Attaches a new UI listener.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: UiEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(listeners) => tracing::debug!(event = name, listeners, "ui event emitted"),
            Err(_) => tracing::trace!(event = name, "no ui listener attached, event dropped"),
        }
    }
}

/// Mock event sink for testing.
#[derive(Debug, Default)]
pub struct MockEventSink {
    events: Mutex<Vec<UiEvent>>,
}

impl MockEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all emitted events in order.
    pub fn events(&self) -> Vec<UiEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Counts emitted events equal to `event`.
    pub fn count(&self, event: &UiEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for MockEventSink {
    fn emit(&self, event: UiEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

// ============================================================================
// Tests
// ============================================================================
