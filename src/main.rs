//! NavTap-Lock desktop harness
//!
//! Drives the gesture engine end to end on a development machine:
//! global pointer events from rdev stand in for the navigation surface
//! (a strip along the bottom of the screen), and the lock action runs
//! through a session-lock command chain. Double-click the bottom strip
//! to lock the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rdev::{listen, Button, Event, EventType};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use navtap_lock::dispatcher::{
    uptime_ms, CommandStrategy, LockCooldown, LockDispatcher, LockStrategy, LOCK_COOLDOWN_MS,
};
use navtap_lock::exclusion::{HintState, PlatformConfig, ProbeError, Rect, SurfaceProbe};
use navtap_lock::surface::{ClassHandle, HookRuntime, SurfaceKind};
use navtap_lock::{Engine, EngineConfig, LockRoute, PointerEvent, PointerKind, ProcessRole};

/// Height of the fake navigation strip at the bottom of the screen.
const STRIP_HEIGHT_PX: f32 = 120.0;

/// The harness has no class loader; the first candidate always resolves.
struct DesktopRuntime;

impl HookRuntime for DesktopRuntime {
    fn find_class(&self, _class_name: &str) -> Option<ClassHandle> {
        Some(ClassHandle(1))
    }
}

/// Desktop stand-in for platform configuration: three-button layout,
/// stock double-tap interval.
struct DesktopPlatform;

impl PlatformConfig for DesktopPlatform {
    fn nav_mode_setting(&self) -> Option<i32> {
        Some(0)
    }
    fn nav_mode_from_settings(&self) -> Option<i32> {
        None
    }
    fn double_tap_timeout_ms(&self) -> Option<u64> {
        Some(300)
    }
}

/// The strip has no adjacent controls and no hint indicator.
struct DesktopProbe {
    strip_top: f32,
}

impl SurfaceProbe for DesktopProbe {
    fn surface_origin(&self) -> Result<(f32, f32), ProbeError> {
        Ok((0.0, self.strip_top))
    }
    fn control_bounds(&self, _control: &str) -> Result<Option<Rect>, ProbeError> {
        Ok(None)
    }
    fn hint_indicator(&self) -> Result<HintState, ProbeError> {
        Ok(HintState::NotPresent)
    }
}

/// Session-lock command chain for common desktop setups.
fn desktop_chain() -> Vec<Box<dyn LockStrategy>> {
    vec![
        Box::new(CommandStrategy::new(
            "loginctl-lock",
            "loginctl",
            &["lock-session"],
        )),
        Box::new(CommandStrategy::new(
            "xdg-screensaver-lock",
            "xdg-screensaver",
            &["lock"],
        )),
        Box::new(CommandStrategy::new(
            "xset-dpms-off",
            "xset",
            &["dpms", "force", "off"],
        )),
    ]
}

/// Start the global listener and translate pointer activity in the
/// bottom strip into surface-local events, the way the hooked surface
/// would deliver them.
fn start_pointer_listener(
    sender: mpsc::Sender<PointerEvent>,
    strip_top: f32,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        info!("pointer listener started");

        let mut position = (0.0f32, 0.0f32);
        let mut pressed = false;

        let callback = move |event: Event| {
            match event.event_type {
                EventType::MouseMove { x, y } => {
                    position = (x as f32, y as f32);
                    if pressed {
                        forward(&sender, PointerKind::Move, position, strip_top);
                    }
                }
                EventType::ButtonPress(Button::Left) => {
                    pressed = true;
                    forward(&sender, PointerKind::Down, position, strip_top);
                }
                EventType::ButtonRelease(Button::Left) => {
                    pressed = false;
                    forward(&sender, PointerKind::Up, position, strip_top);
                }
                _ => {}
            }
        };

        if let Err(e) = listen(callback) {
            error!("Error in pointer listener: {:?}", e);
        }
    })
}

fn forward(
    sender: &mpsc::Sender<PointerEvent>,
    kind: PointerKind,
    (raw_x, raw_y): (f32, f32),
    strip_top: f32,
) {
    let event = PointerEvent {
        kind,
        x: raw_x,
        y: raw_y - strip_top,
        raw_x,
        raw_y,
        event_time: uptime_ms(),
    };
    if let Err(e) = sender.send(event) {
        error!("Failed to send pointer event: {}", e);
    }
}

fn main() {
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .compact()
        .init();

    info!("NavTap-Lock harness starting...");

    let config = EngineConfig::default();
    let (screen_w, screen_h) = rdev::display_size().unwrap_or((1920, 1080));
    let strip_top = screen_h as f32 - STRIP_HEIGHT_PX;
    info!(
        "Observing strip y >= {} on a {}x{} screen",
        strip_top, screen_w, screen_h
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        running_clone.store(false, Ordering::SeqCst);
    })
    .expect("Failed to set Ctrl+C handler");

    let cooldown = Arc::new(LockCooldown::new(LOCK_COOLDOWN_MS));
    let dispatcher = Arc::new(LockDispatcher::new(desktop_chain(), cooldown));

    let mut engine = Engine::new(
        ProcessRole::Shell,
        &DesktopPlatform,
        config,
        LockRoute::Direct(dispatcher),
    );
    if !engine.attach_role_surface(&DesktopRuntime, Box::new(DesktopProbe { strip_top })) {
        error!("Failed to attach the observed surface");
        return;
    }

    let (sender, receiver) = mpsc::channel();
    let _listener_handle = start_pointer_listener(sender, strip_top);

    info!("Ready - double-click the bottom strip to lock");
    info!("Press Ctrl+C to exit");

    // Only gestures that start inside the strip belong to the surface.
    let mut gesture_in_strip = false;

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                match event.kind {
                    PointerKind::Down => {
                        gesture_in_strip = event.raw_y >= strip_top;
                        if !gesture_in_strip {
                            continue;
                        }
                    }
                    _ if !gesture_in_strip => continue,
                    _ => {}
                }
                debug!(kind = ?event.kind, x = event.x, y = event.y, "strip event");
                engine.handle_pointer(SurfaceKind::NavigationBarFrame, &event);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!("Pointer listener disconnected");
                break;
            }
        }
    }

    info!("NavTap-Lock harness shutting down...");
}
