//! Tap geometry: classifying a pointer-down/pointer-up pair as a tap.
//!
//! Pure computation, no side effects. A pair is a tap when it was both
//! short (duration) and stationary (euclidean distance).

/// Default maximum press duration for a tap, in milliseconds.
pub const MAX_TAP_DURATION_MS: u64 = 300;

/// Default maximum travel between down and up for a tap, in pixels.
pub const MAX_TAP_DISTANCE_PX: f32 = 100.0;

/// A single pointer sample in surface-local coordinates.
///
/// `timestamp` is monotonic event time in milliseconds. Time 0 is a
/// valid event time; "no pending down" is modelled by the recognizer
/// holding no sample at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    pub x: f32,
    pub y: f32,
    pub timestamp: u64,
}

impl TouchSample {
    pub fn new(x: f32, y: f32, timestamp: u64) -> Self {
        Self { x, y, timestamp }
    }
}

/// Tap classification thresholds.
#[derive(Debug, Clone, Copy)]
pub struct TapThresholds {
    /// Maximum down-to-up duration in milliseconds (inclusive).
    pub max_duration_ms: u64,

    /// Maximum down-to-up travel in pixels (inclusive).
    pub max_distance_px: f32,
}

impl Default for TapThresholds {
    fn default() -> Self {
        Self {
            max_duration_ms: MAX_TAP_DURATION_MS,
            max_distance_px: MAX_TAP_DISTANCE_PX,
        }
    }
}

/// Euclidean distance between two samples.
pub fn distance(down: &TouchSample, up: &TouchSample) -> f32 {
    let dx = up.x - down.x;
    let dy = up.y - down.y;
    (dx * dx + dy * dy).sqrt()
}

/// Classify a down/up pair as a tap.
///
/// Returns true iff the elapsed time and travelled distance are both
/// within the thresholds (boundary values count as taps). Never
/// panics: an up earlier than its down saturates to zero elapsed.
pub fn classify_tap(down: &TouchSample, up: &TouchSample, thresholds: &TapThresholds) -> bool {
    let elapsed = up.timestamp.saturating_sub(down.timestamp);
    elapsed <= thresholds.max_duration_ms && distance(down, up) <= thresholds.max_distance_px
}
