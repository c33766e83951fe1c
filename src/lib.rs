//! NavTap-Lock - Double-tap-to-lock gesture engine for navigation surfaces
//!
//! This library provides components for:
//! - Tap classification and per-surface double-tap recognition
//! - Versioned resolution of the observed navigation surface
//! - Per-tap exclusion of adjacent interactive controls
//! - A prioritized fallback chain for performing the lock action
//! - A cross-process relay for processes that cannot lock directly

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod exclusion;
pub mod geometry;
pub mod recognizer;
pub mod relay;
pub mod surface;

pub use config::EngineConfig;
pub use dispatcher::{LockCooldown, LockDispatcher, LockStrategy};
pub use engine::{Engine, LockRoute, ProcessRole};
pub use recognizer::{DoubleTap, DoubleTapRecognizer, PointerEvent, PointerKind, TapOutcome};
pub use surface::{HookRuntime, Resolution, SurfaceKind};

use thiserror::Error;

/// Main error type for NavTap-Lock
#[derive(Error, Debug)]
pub enum NavTapError {
    #[error("Failed to read touch event: {0}")]
    EventRead(String),

    #[error("Failed to send lock signal: {0}")]
    Relay(String),

    #[error("Channel error: {0}")]
    Channel(String),
}
