//! Navigation-mode detection and per-tap admission checks.
//!
//! In button navigation a double-tap is rejected when it lands on an
//! adjacent interactive control (back, recents). In gesture navigation
//! the check is replaced by a hint-indicator gate: while the indicator
//! is hidden, touches in that region belong to the foreground app.
//!
//! Control bounds are re-resolved on every tap, never cached: layouts
//! change under RTL, button remapping, and visibility toggles, and this
//! code only runs on the rare double-tap path.

use thiserror::Error;
use tracing::debug;

/// Controls whose bounds exclude a tap in button navigation.
pub const EXCLUDED_CONTROLS: &[&str] = &["back", "recent_apps"];

/// Navigation paradigms. The legacy two-button variant behaves like
/// three-button for exclusion purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    ThreeButton,
    TwoButton,
    Gesture,
}

impl NavMode {
    /// Whether the button-exclusion check applies in this mode.
    pub fn uses_button_exclusion(self) -> bool {
        matches!(self, NavMode::ThreeButton | NavMode::TwoButton)
    }
}

/// Read-only platform configuration inputs.
pub trait PlatformConfig {
    /// Navigation mode integer from platform configuration, if exposed.
    fn nav_mode_setting(&self) -> Option<i32>;

    /// Navigation mode from the settings table, the fallback source.
    fn nav_mode_from_settings(&self) -> Option<i32>;

    /// Platform double-tap interval in milliseconds.
    fn double_tap_timeout_ms(&self) -> Option<u64>;
}

/// Resolve the navigation mode: platform configuration first, settings
/// table second, three-button when neither source is available.
pub fn detect_nav_mode(config: &dyn PlatformConfig) -> NavMode {
    let raw = config
        .nav_mode_setting()
        .or_else(|| config.nav_mode_from_settings());
    match raw {
        Some(2) => NavMode::Gesture,
        Some(1) => NavMode::TwoButton,
        Some(_) => NavMode::ThreeButton,
        None => {
            debug!("navigation mode unavailable, assuming three-button");
            NavMode::ThreeButton
        }
    }
}

/// Screen-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Half-open containment, matching platform view bounds.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// Visibility of the gesture-navigation hint indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HintState {
    /// Indicator laid out and visible; alpha 0.0 means fully transparent.
    Visible { alpha: f32 },
    /// Indicator exists but is hidden (immersive mode and the like).
    Hidden,
    /// This build has no hint indicator view.
    NotPresent,
}

#[derive(Debug, Error)]
#[error("view state read failed: {0}")]
pub struct ProbeError(pub String);

/// Live view-state queries against one observed surface. Every method
/// reflects the current layout at call time.
pub trait SurfaceProbe: Send + Sync {
    /// Current on-screen origin of the observed surface.
    fn surface_origin(&self) -> Result<(f32, f32), ProbeError>;

    /// Screen bounds of a named control, `None` when the control is
    /// absent or not currently visible.
    fn control_bounds(&self, control: &str) -> Result<Option<Rect>, ProbeError>;

    /// State of the gesture-navigation hint indicator.
    fn hint_indicator(&self) -> Result<HintState, ProbeError>;
}

/// Test a tap (surface-local coordinates) against the excluded controls.
///
/// Fail-open throughout: a missing or invisible control excludes
/// nothing, and any probe error is treated as "not excluded". Nothing
/// escapes this function.
pub fn is_excluded(probe: &dyn SurfaceProbe, tap_x: f32, tap_y: f32) -> bool {
    let (origin_x, origin_y) = match probe.surface_origin() {
        Ok(origin) => origin,
        Err(e) => {
            debug!(error = %e, "surface origin unavailable, not excluding");
            return false;
        }
    };
    let screen_x = origin_x + tap_x;
    let screen_y = origin_y + tap_y;

    for control in EXCLUDED_CONTROLS {
        match probe.control_bounds(control) {
            Ok(Some(bounds)) if bounds.contains(screen_x, screen_y) => {
                debug!(control, "tap landed on excluded control");
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(control, error = %e, "bounds unavailable, not excluding");
            }
        }
    }
    false
}

/// Gesture-mode gate: honor the double-tap only while the hint
/// indicator is visible and non-transparent. A build without the
/// indicator, or a probe error, allows the gesture.
pub fn hint_gate_allows(probe: &dyn SurfaceProbe) -> bool {
    match probe.hint_indicator() {
        Ok(HintState::Visible { alpha }) => {
            if alpha > 0.0 {
                true
            } else {
                debug!("hint indicator transparent, suppressing double tap");
                false
            }
        }
        Ok(HintState::Hidden) => {
            debug!("hint indicator hidden, suppressing double tap");
            false
        }
        Ok(HintState::NotPresent) => true,
        Err(e) => {
            debug!(error = %e, "hint indicator state unavailable, allowing");
            true
        }
    }
}
