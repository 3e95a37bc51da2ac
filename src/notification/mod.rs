//! Status surface synchronization.
//!
//! This module keeps the on-screen status indicator consistent with the
//! timer:
//!
//! - `surface`: the `StatusSurface` collaborator and its implementations
//! - `sync`: the 1 Hz `NotificationSync` driven by the control task
//!
//! # Error Handling
//!
//! The timer is authoritative. Every [`NotificationError`] is logged and
//! swallowed, so an unavailable surface never changes timer behaviour.

pub mod error;
pub mod surface;
pub mod sync;

pub use error::NotificationError;
pub use surface::{MockStatusSurface, StatusSurface, StatusUpdate, WatchStatusSurface};
pub use sync::{
    NotificationSync, STATUS_COMPLETED, STATUS_PAUSED, STATUS_RUNNING, STATUS_STOPPED,
    TICK_INTERVAL,
};
