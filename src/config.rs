//! Configuration for the gesture engine

use crate::geometry::TapThresholds;

/// Fallback double-tap interval when the platform exposes none.
pub const DEFAULT_DOUBLE_TAP_TIMEOUT_MS: u64 = 300;

/// Tunable parameters for the engine. Cooldown window and verification
/// delay are dispatcher-level settings, configured where the
/// `LockDispatcher` is built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tap duration/distance thresholds
    pub thresholds: TapThresholds,

    /// Double-tap interval used when the platform value is unavailable
    pub double_tap_timeout_fallback_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: TapThresholds::default(),
            double_tap_timeout_fallback_ms: DEFAULT_DOUBLE_TAP_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Create a config with custom tap thresholds
    pub fn with_thresholds(mut self, thresholds: TapThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Create a config with a custom double-tap timeout fallback
    pub fn with_double_tap_timeout_fallback_ms(mut self, timeout_ms: u64) -> Self {
        self.double_tap_timeout_fallback_ms = timeout_ms;
        self
    }
}
