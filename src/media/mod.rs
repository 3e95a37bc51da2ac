//! Media-button input.
//!
//! This module turns hardware key events into timer commands:
//! - `keys`: key codes and the pure play/pause classifier
//! - `session`: the playback-session claim and volume-key double press
//! - `dispatcher`: entry-point normalization and the registration guard

pub mod dispatcher;
pub mod error;
pub mod keys;
pub mod session;

pub use dispatcher::{DispatchOutcome, IgnoreReason, MediaButtonDispatcher, SessionCallback};
pub use error::DispatchError;
pub use keys::{classify, ButtonCommand, KeyCode, KeyEdge, KeyInput, MediaKey};
pub use session::{DoublePressDetector, MediaSession, DOUBLE_PRESS_WINDOW};
