//! Per-surface double-tap state machine.
//!
//! One recognizer instance is bound to one observed surface and fed that
//! surface's pointer events in delivery order. Events on a given surface
//! arrive on its own dispatch thread, so the recognizer keeps plain
//! mutable state and needs no locking of its own.

use tracing::{debug, trace};

use crate::geometry::{classify_tap, distance, TapThresholds, TouchSample};

/// Pointer action kinds delivered by the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
}

/// A pointer event in surface-local coordinates, with the raw screen
/// position carried alongside.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
    pub raw_x: f32,
    pub raw_y: f32,
    /// Monotonic event time in milliseconds.
    pub event_time: u64,
}

/// Emitted when two qualifying taps land within the double-tap timeout.
#[derive(Debug, Clone, Copy)]
pub struct DoubleTap {
    /// Surface-local position of the concluding up event.
    pub x: f32,
    pub y: f32,
    /// Screen position of the concluding up event.
    pub raw_x: f32,
    pub raw_y: f32,
    pub event_time: u64,
}

/// What one pointer event amounted to.
#[derive(Debug, Clone, Copy)]
pub enum TapOutcome {
    /// No state change the caller needs to act on.
    None,
    /// This up qualified as a tap and now pends as the first of a pair.
    FirstTap,
    /// This up completed a double tap.
    DoubleTap(DoubleTap),
}

impl TapOutcome {
    pub fn is_double_tap(&self) -> bool {
        matches!(self, TapOutcome::DoubleTap(_))
    }
}

/// Double-tap recognizer for a single observed surface.
///
/// At most one pending "first tap" exists at any time; it is cleared on
/// cancel, on a non-tap interaction, on excessive movement, and when a
/// double-tap is consumed.
pub struct DoubleTapRecognizer {
    thresholds: TapThresholds,
    /// Platform double-tap interval: maximum gap between the two up
    /// events, measured from the first tap's up.
    double_tap_timeout_ms: u64,
    /// Whether to invalidate the current down on excessive movement.
    /// Only some surfaces deliver useful move streams.
    track_moves: bool,
    down: Option<TouchSample>,
    /// Event time of the pending first tap's up.
    last_tap: Option<u64>,
}

impl DoubleTapRecognizer {
    pub fn new(thresholds: TapThresholds, double_tap_timeout_ms: u64, track_moves: bool) -> Self {
        Self {
            thresholds,
            double_tap_timeout_ms,
            track_moves,
            down: None,
            last_tap: None,
        }
    }

    /// Feed one pointer event. Never consumes the host's event and
    /// never panics on odd sequences (up without down, repeated downs).
    pub fn on_event(&mut self, event: &PointerEvent) -> TapOutcome {
        match event.kind {
            PointerKind::Down => {
                self.down = Some(TouchSample::new(event.x, event.y, event.event_time));
                TapOutcome::None
            }
            PointerKind::Move => {
                if !self.track_moves {
                    return TapOutcome::None;
                }
                if let Some(down) = self.down {
                    let here = TouchSample::new(event.x, event.y, event.event_time);
                    if distance(&down, &here) > self.thresholds.max_distance_px {
                        // A drag, not a tap: drop the down and any pending
                        // first tap so the release cannot complete a pair.
                        trace!("movement exceeded tap distance, invalidating gesture");
                        self.reset();
                    }
                }
                TapOutcome::None
            }
            PointerKind::Up => self.on_up(event),
            PointerKind::Cancel => {
                self.reset();
                TapOutcome::None
            }
        }
    }

    fn on_up(&mut self, event: &PointerEvent) -> TapOutcome {
        let Some(down) = self.down.take() else {
            return TapOutcome::None;
        };
        let up = TouchSample::new(event.x, event.y, event.event_time);

        if !classify_tap(&down, &up, &self.thresholds) {
            // Held too long or moved too far: a new gesture, not a tap.
            self.last_tap = None;
            return TapOutcome::None;
        }

        let now = event.event_time;
        if let Some(last) = self.last_tap {
            if now.saturating_sub(last) <= self.double_tap_timeout_ms {
                debug!(gap_ms = now - last, "double tap detected");
                self.last_tap = None;
                return TapOutcome::DoubleTap(DoubleTap {
                    x: event.x,
                    y: event.y,
                    raw_x: event.raw_x,
                    raw_y: event.raw_y,
                    event_time: now,
                });
            }
        }

        // No live first tap (none pending, or the pending one expired):
        // this tap becomes the new first tap.
        self.last_tap = Some(now);
        TapOutcome::FirstTap
    }

    fn reset(&mut self) {
        self.down = None;
        self.last_tap = None;
    }
}
