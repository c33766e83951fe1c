//! Process-attach entry point tying the pieces together.
//!
//! One engine instance exists per hooked process. At attach time it
//! resolves the surface its process role observes, builds one
//! recognizer per resolved surface, and wires detections through the
//! admission checks into either the local dispatcher or the
//! cross-process relay. Nothing in this module lets an error escape
//! into the host's event-dispatch path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dispatcher::{uptime_ms, LockCooldown, LockDispatcher};
use crate::exclusion::{
    detect_nav_mode, hint_gate_allows, is_excluded, NavMode, PlatformConfig, SurfaceProbe,
};
use crate::recognizer::{DoubleTapRecognizer, PointerEvent, PointerKind, TapOutcome};
use crate::relay::SignalSender;
use crate::surface::{resolve_surface, HookRuntime, Resolution, SurfaceBinding, SurfaceKind};
use crate::NavTapError;

/// Identity of the hooked process, decided at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// The OS shell: holds the power permission, hosts the 3-button bar.
    Shell,
    /// The home-screen process: hosts the gesture taskbar, cannot lock
    /// directly.
    Launcher,
}

impl ProcessRole {
    /// The surface this process observes for double-taps.
    pub fn observed_surface(self) -> SurfaceKind {
        match self {
            ProcessRole::Shell => SurfaceKind::NavigationBarFrame,
            ProcessRole::Launcher => SurfaceKind::TaskbarDragLayer,
        }
    }
}

/// How a confirmed double-tap turns into a lock action.
pub enum LockRoute {
    /// Run the fallback chain in this process.
    Direct(Arc<LockDispatcher>),
    /// Signal the privileged process; the cooldown still applies on the
    /// sending side to debounce overlapping local detections.
    Relay {
        sender: Box<dyn SignalSender>,
        cooldown: Arc<LockCooldown>,
    },
}

/// Fallible view of one raw host touch event. Hosts whose event objects
/// can throw on field access implement this; every read error degrades
/// to a no-op for that single event.
pub trait RawTouchEvent {
    fn action(&self) -> Result<PointerKind, NavTapError>;
    fn x(&self) -> Result<f32, NavTapError>;
    fn y(&self) -> Result<f32, NavTapError>;
    fn raw_x(&self) -> Result<f32, NavTapError>;
    fn raw_y(&self) -> Result<f32, NavTapError>;
    fn event_time(&self) -> Result<u64, NavTapError>;
}

struct ObservedSurface {
    binding: SurfaceBinding,
    // Events for one surface arrive on that surface's own thread, so
    // this mutex is never contended; it only satisfies shared access
    // across the differently threaded surfaces.
    recognizer: Mutex<DoubleTapRecognizer>,
    /// Whether the pending first tap landed on an excluded control.
    /// Evaluated at that tap's up; a tap on a button must never
    /// contribute to a trigger even as the first of the pair.
    first_tap_excluded: AtomicBool,
    probe: Box<dyn SurfaceProbe>,
}

/// Per-process gesture engine.
pub struct Engine {
    role: ProcessRole,
    nav_mode: NavMode,
    config: EngineConfig,
    double_tap_timeout_ms: u64,
    route: LockRoute,
    surfaces: HashMap<SurfaceKind, ObservedSurface>,
}

impl Engine {
    /// Build an engine for this process. Surfaces are attached
    /// separately since each needs its host-provided probe.
    pub fn new(role: ProcessRole, platform: &dyn PlatformConfig, config: EngineConfig, route: LockRoute) -> Self {
        let nav_mode = detect_nav_mode(platform);
        let double_tap_timeout_ms = platform
            .double_tap_timeout_ms()
            .unwrap_or(config.double_tap_timeout_fallback_ms);
        info!(?role, ?nav_mode, double_tap_timeout_ms, "engine created");
        Self {
            role,
            nav_mode,
            config,
            double_tap_timeout_ms,
            route,
            surfaces: HashMap::new(),
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn nav_mode(&self) -> NavMode {
        self.nav_mode
    }

    /// Resolve and observe one surface. Returns false (and logs, once,
    /// inside resolution) when no candidate class exists in this
    /// process; that path then stays disabled for the process lifetime.
    pub fn attach_surface(
        &mut self,
        runtime: &dyn HookRuntime,
        kind: SurfaceKind,
        probe: Box<dyn SurfaceProbe>,
    ) -> bool {
        let binding = match resolve_surface(runtime, kind) {
            Resolution::Found(binding) => binding,
            Resolution::NotFound => return false,
        };
        // Only the taskbar delivers a move stream worth tracking.
        let track_moves = kind == SurfaceKind::TaskbarDragLayer;
        let recognizer = DoubleTapRecognizer::new(
            self.config.thresholds,
            self.double_tap_timeout_ms,
            track_moves,
        );
        self.surfaces.insert(
            kind,
            ObservedSurface {
                binding,
                recognizer: Mutex::new(recognizer),
                first_tap_excluded: AtomicBool::new(false),
                probe,
            },
        );
        true
    }

    /// Convenience: attach the surface this process role observes.
    pub fn attach_role_surface(
        &mut self,
        runtime: &dyn HookRuntime,
        probe: Box<dyn SurfaceProbe>,
    ) -> bool {
        self.attach_surface(runtime, self.role.observed_surface(), probe)
    }

    /// Entry point for hosts with fallible event objects. Any field
    /// read error is logged and swallowed; the host's own handling of
    /// the event is never affected.
    pub fn handle_touch(&self, kind: SurfaceKind, event: &dyn RawTouchEvent) {
        let parsed = (|| -> Result<PointerEvent, NavTapError> {
            Ok(PointerEvent {
                kind: event.action()?,
                x: event.x()?,
                y: event.y()?,
                raw_x: event.raw_x()?,
                raw_y: event.raw_y()?,
                event_time: event.event_time()?,
            })
        })();
        match parsed {
            Ok(event) => self.handle_pointer(kind, &event),
            Err(e) => debug!(error = %e, "unreadable touch event, ignoring"),
        }
    }

    /// Feed one pointer event for an observed surface. Observe-only:
    /// the event always continues to the platform's normal handling.
    pub fn handle_pointer(&self, kind: SurfaceKind, event: &PointerEvent) {
        let Some(surface) = self.surfaces.get(&kind) else {
            return;
        };
        let outcome = match surface.recognizer.lock() {
            Ok(mut recognizer) => recognizer.on_event(event),
            Err(poisoned) => {
                // A panicking surface thread must not disable the
                // gesture for the rest of the process.
                poisoned.into_inner().on_event(event)
            }
        };
        match outcome {
            TapOutcome::None => {}
            TapOutcome::FirstTap => {
                // Exclusion is evaluated per tap, at its up, so a tap
                // landing on a button is remembered as disqualified
                // while still arming the usual tap-timing state.
                if self.nav_mode.uses_button_exclusion() {
                    let excluded = is_excluded(surface.probe.as_ref(), event.x, event.y);
                    surface.first_tap_excluded.store(excluded, Ordering::SeqCst);
                }
            }
            TapOutcome::DoubleTap(_) => self.on_double_tap(surface, event),
        }
    }

    /// Admission checks, then dispatch or relay.
    fn on_double_tap(&self, surface: &ObservedSurface, event: &PointerEvent) {
        if self.nav_mode.uses_button_exclusion() {
            let first_excluded = surface.first_tap_excluded.swap(false, Ordering::SeqCst);
            if first_excluded || is_excluded(surface.probe.as_ref(), event.x, event.y) {
                debug!(
                    class = surface.binding.class_name,
                    first_excluded, "double tap touched excluded control, suppressed"
                );
                return;
            }
        } else if !hint_gate_allows(surface.probe.as_ref()) {
            return;
        }

        info!(class = surface.binding.class_name, "double tap accepted");
        match &self.route {
            LockRoute::Direct(dispatcher) => {
                dispatcher.dispatch(uptime_ms());
            }
            LockRoute::Relay { sender, cooldown } => {
                if !cooldown.try_acquire(uptime_ms()) {
                    debug!("lock signal suppressed by cooldown");
                    return;
                }
                if let Err(e) = sender.send_lock_signal() {
                    warn!(error = %e, "failed to relay lock signal");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{AttemptError, LockStrategy, LOCK_COOLDOWN_MS};
    use crate::exclusion::{HintState, ProbeError, Rect};
    use crate::relay::signal_channel;
    use crate::surface::ClassHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AllClassesRuntime;

    impl HookRuntime for AllClassesRuntime {
        fn find_class(&self, _class_name: &str) -> Option<ClassHandle> {
            Some(ClassHandle(1))
        }
    }

    struct NoClassesRuntime;

    impl HookRuntime for NoClassesRuntime {
        fn find_class(&self, _class_name: &str) -> Option<ClassHandle> {
            None
        }
    }

    struct FakeConfig {
        nav_mode: Option<i32>,
    }

    impl PlatformConfig for FakeConfig {
        fn nav_mode_setting(&self) -> Option<i32> {
            self.nav_mode
        }
        fn nav_mode_from_settings(&self) -> Option<i32> {
            None
        }
        fn double_tap_timeout_ms(&self) -> Option<u64> {
            Some(300)
        }
    }

    struct FakeProbe {
        back: Option<Rect>,
        hint: HintState,
    }

    impl FakeProbe {
        fn boxed(back: Option<Rect>, hint: HintState) -> Box<dyn SurfaceProbe> {
            Box::new(Self { back, hint })
        }
    }

    impl SurfaceProbe for FakeProbe {
        fn surface_origin(&self) -> Result<(f32, f32), ProbeError> {
            Ok((0.0, 0.0))
        }
        fn control_bounds(&self, control: &str) -> Result<Option<Rect>, ProbeError> {
            Ok(if control == "back" { self.back } else { None })
        }
        fn hint_indicator(&self) -> Result<HintState, ProbeError> {
            Ok(self.hint)
        }
    }

    struct CountingStrategy {
        attempts: Arc<AtomicUsize>,
    }

    impl LockStrategy for CountingStrategy {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn attempt(&self) -> Result<(), AttemptError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn direct_route() -> (LockRoute, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(LockDispatcher::new(
            vec![Box::new(CountingStrategy {
                attempts: Arc::clone(&attempts),
            })],
            Arc::new(LockCooldown::new(LOCK_COOLDOWN_MS)),
        ));
        (LockRoute::Direct(dispatcher), attempts)
    }

    fn shell_engine(nav_mode: i32, route: LockRoute) -> Engine {
        Engine::new(
            ProcessRole::Shell,
            &FakeConfig {
                nav_mode: Some(nav_mode),
            },
            EngineConfig::default(),
            route,
        )
    }

    fn ev(kind: PointerKind, x: f32, y: f32, t: u64) -> PointerEvent {
        PointerEvent {
            kind,
            x,
            y,
            raw_x: x,
            raw_y: y,
            event_time: t,
        }
    }

    fn double_tap(engine: &Engine, kind: SurfaceKind, x: f32, y: f32) {
        engine.handle_pointer(kind, &ev(PointerKind::Down, x, y, 1_000));
        engine.handle_pointer(kind, &ev(PointerKind::Up, x, y, 1_050));
        engine.handle_pointer(kind, &ev(PointerKind::Down, x, y, 1_150));
        engine.handle_pointer(kind, &ev(PointerKind::Up, x, y, 1_200));
    }

    #[test]
    fn double_tap_on_nav_bar_dispatches_lock() {
        let (route, attempts) = direct_route();
        let mut engine = shell_engine(0, route);
        assert!(engine.attach_role_surface(
            &AllClassesRuntime,
            FakeProbe::boxed(None, HintState::NotPresent)
        ));
        double_tap(&engine, SurfaceKind::NavigationBarFrame, 500.0, 40.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolved_surface_detects_nothing() {
        let (route, attempts) = direct_route();
        let mut engine = shell_engine(0, route);
        assert!(!engine.attach_role_surface(
            &NoClassesRuntime,
            FakeProbe::boxed(None, HintState::NotPresent)
        ));
        double_tap(&engine, SurfaceKind::NavigationBarFrame, 500.0, 40.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tap_on_excluded_button_is_suppressed_but_updates_state() {
        let (route, attempts) = direct_route();
        let mut engine = shell_engine(0, route);
        let back = Some(Rect::new(0.0, 0.0, 200.0, 100.0));
        assert!(engine
            .attach_role_surface(&AllClassesRuntime, FakeProbe::boxed(back, HintState::NotPresent)));

        // Inside the back button: detection happens but is not admitted.
        double_tap(&engine, SurfaceKind::NavigationBarFrame, 50.0, 40.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);

        // The suppressed detection consumed tap state: one further tap
        // alone must not fire, a fresh pair away from the button does.
        let kind = SurfaceKind::NavigationBarFrame;
        engine.handle_pointer(kind, &ev(PointerKind::Down, 500.0, 40.0, 1_300));
        engine.handle_pointer(kind, &ev(PointerKind::Up, 500.0, 40.0, 1_350));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        engine.handle_pointer(kind, &ev(PointerKind::Down, 500.0, 40.0, 1_450));
        engine.handle_pointer(kind, &ev(PointerKind::Up, 500.0, 40.0, 1_500));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_tap_on_excluded_button_suppresses_the_pair() {
        let (route, attempts) = direct_route();
        let mut engine = shell_engine(0, route);
        let back = Some(Rect::new(0.0, 0.0, 200.0, 100.0));
        assert!(engine
            .attach_role_surface(&AllClassesRuntime, FakeProbe::boxed(back, HintState::NotPresent)));
        let kind = SurfaceKind::NavigationBarFrame;

        // First tap inside the back button, second in clear space: the
        // buttoned tap must never contribute to a trigger.
        engine.handle_pointer(kind, &ev(PointerKind::Down, 50.0, 40.0, 1_000));
        engine.handle_pointer(kind, &ev(PointerKind::Up, 50.0, 40.0, 1_050));
        engine.handle_pointer(kind, &ev(PointerKind::Down, 500.0, 40.0, 1_150));
        engine.handle_pointer(kind, &ev(PointerKind::Up, 500.0, 40.0, 1_200));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);

        // A fresh pair entirely in clear space still locks.
        double_tap(&engine, kind, 500.0, 40.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn gesture_mode_gates_on_hint_visibility() {
        let (route, attempts) = direct_route();
        let mut engine = Engine::new(
            ProcessRole::Launcher,
            &FakeConfig { nav_mode: Some(2) },
            EngineConfig::default(),
            route,
        );
        assert!(engine.attach_role_surface(
            &AllClassesRuntime,
            FakeProbe::boxed(None, HintState::Hidden)
        ));
        double_tap(&engine, SurfaceKind::TaskbarDragLayer, 500.0, 20.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn gesture_mode_allows_with_visible_hint() {
        let (route, attempts) = direct_route();
        let mut engine = Engine::new(
            ProcessRole::Launcher,
            &FakeConfig { nav_mode: Some(2) },
            EngineConfig::default(),
            route,
        );
        assert!(engine.attach_role_surface(
            &AllClassesRuntime,
            FakeProbe::boxed(None, HintState::Visible { alpha: 1.0 })
        ));
        double_tap(&engine, SurfaceKind::TaskbarDragLayer, 500.0, 20.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn launcher_relays_instead_of_dispatching() {
        let (sender, receiver) = signal_channel();
        let mut engine = Engine::new(
            ProcessRole::Launcher,
            &FakeConfig { nav_mode: Some(2) },
            EngineConfig::default(),
            LockRoute::Relay {
                sender: Box::new(sender),
                cooldown: Arc::new(LockCooldown::new(LOCK_COOLDOWN_MS)),
            },
        );
        assert!(engine.attach_role_surface(
            &AllClassesRuntime,
            FakeProbe::boxed(None, HintState::Visible { alpha: 1.0 })
        ));
        double_tap(&engine, SurfaceKind::TaskbarDragLayer, 500.0, 20.0);
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn role_maps_to_its_surface() {
        assert_eq!(
            ProcessRole::Shell.observed_surface(),
            SurfaceKind::NavigationBarFrame
        );
        assert_eq!(
            ProcessRole::Launcher.observed_surface(),
            SurfaceKind::TaskbarDragLayer
        );
    }

    struct BrokenEvent;

    impl RawTouchEvent for BrokenEvent {
        fn action(&self) -> Result<PointerKind, NavTapError> {
            Err(NavTapError::EventRead("action".into()))
        }
        fn x(&self) -> Result<f32, NavTapError> {
            Ok(0.0)
        }
        fn y(&self) -> Result<f32, NavTapError> {
            Ok(0.0)
        }
        fn raw_x(&self) -> Result<f32, NavTapError> {
            Ok(0.0)
        }
        fn raw_y(&self) -> Result<f32, NavTapError> {
            Ok(0.0)
        }
        fn event_time(&self) -> Result<u64, NavTapError> {
            Ok(0)
        }
    }

    #[test]
    fn unreadable_event_is_swallowed() {
        let (route, attempts) = direct_route();
        let mut engine = shell_engine(0, route);
        assert!(engine.attach_role_surface(
            &AllClassesRuntime,
            FakeProbe::boxed(None, HintState::NotPresent)
        ));
        engine.handle_touch(SurfaceKind::NavigationBarFrame, &BrokenEvent);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }
}
