//! Versioned resolution of observed navigation surfaces.
//!
//! The platform renames and relocates these classes across OS releases,
//! so each surface kind carries an ordered candidate list of fully
//! qualified class names, newest lineage first. Resolution happens once
//! at process attach; first match wins, and a miss disables that code
//! path for the process lifetime rather than failing the attach.

use tracing::{info, warn};

/// The UI surfaces this engine knows how to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// 3-button navigation bar container (shell process).
    NavigationBarFrame,
    /// Gesture-navigation taskbar layer (launcher process).
    TaskbarDragLayer,
    /// Individual navigation buttons, used for exclusion bounds.
    KeyButtonView,
}

impl SurfaceKind {
    /// Candidate class names for this surface, one per OS release
    /// lineage, ordered newest first. Versioned data, not code branches.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            SurfaceKind::NavigationBarFrame => &[
                // 16+
                "com.android.systemui.navigationbar.views.NavigationBarFrame",
                // 12L-15
                "com.android.systemui.navigationbar.NavigationBarFrame",
                // older
                "com.android.systemui.statusbar.phone.NavigationBarFrame",
            ],
            SurfaceKind::TaskbarDragLayer => &["com.android.launcher3.taskbar.TaskbarDragLayer"],
            SurfaceKind::KeyButtonView => &[
                // 16+
                "com.android.systemui.navigationbar.buttons.KeyButtonView",
                // older
                "com.android.systemui.statusbar.policy.KeyButtonView",
            ],
        }
    }
}

/// Opaque handle to a class resolved inside the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassHandle(pub u64);

/// Narrow seam to the host's hook runtime. The engine only needs to ask
/// whether a class exists; installing the actual interception and
/// forwarding events back into the engine is the host's job.
pub trait HookRuntime {
    /// Look up a class by fully qualified name in the host process.
    fn find_class(&self, class_name: &str) -> Option<ClassHandle>;
}

/// A resolved surface: which candidate matched, and its handle.
/// Created once at attach time, immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceBinding {
    pub kind: SurfaceKind,
    pub class_name: &'static str,
    pub handle: ClassHandle,
}

/// Outcome of surface resolution.
#[derive(Debug, Clone, Copy)]
pub enum Resolution {
    Found(SurfaceBinding),
    NotFound,
}

/// Try each candidate in order and bind the first that exists.
///
/// A miss is logged exactly once here and reported as `NotFound`; the
/// caller simply skips installing that surface (fail-soft).
pub fn resolve_surface(runtime: &dyn HookRuntime, kind: SurfaceKind) -> Resolution {
    for &class_name in kind.candidates() {
        if let Some(handle) = runtime.find_class(class_name) {
            info!(?kind, class = class_name, "resolved surface");
            return Resolution::Found(SurfaceBinding {
                kind,
                class_name,
                handle,
            });
        }
    }
    warn!(?kind, "no known surface class found, path disabled");
    Resolution::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRuntime {
        present: Vec<&'static str>,
    }

    impl HookRuntime for FakeRuntime {
        fn find_class(&self, class_name: &str) -> Option<ClassHandle> {
            self.present
                .iter()
                .position(|c| *c == class_name)
                .map(|i| ClassHandle(i as u64 + 1))
        }
    }

    #[test]
    fn first_matching_candidate_wins() {
        // An older build where both the legacy and mid lineage names
        // exist must still bind the newest one present.
        let runtime = FakeRuntime {
            present: vec![
                "com.android.systemui.statusbar.phone.NavigationBarFrame",
                "com.android.systemui.navigationbar.NavigationBarFrame",
            ],
        };
        match resolve_surface(&runtime, SurfaceKind::NavigationBarFrame) {
            Resolution::Found(binding) => {
                assert_eq!(
                    binding.class_name,
                    "com.android.systemui.navigationbar.NavigationBarFrame"
                );
                assert_eq!(binding.kind, SurfaceKind::NavigationBarFrame);
            }
            Resolution::NotFound => panic!("expected a binding"),
        }
    }

    #[test]
    fn unknown_build_resolves_to_not_found() {
        let runtime = FakeRuntime { present: vec![] };
        assert!(matches!(
            resolve_surface(&runtime, SurfaceKind::TaskbarDragLayer),
            Resolution::NotFound
        ));
    }

    #[test]
    fn every_kind_has_at_least_one_candidate() {
        for kind in [
            SurfaceKind::NavigationBarFrame,
            SurfaceKind::TaskbarDragLayer,
            SurfaceKind::KeyButtonView,
        ] {
            assert!(!kind.candidates().is_empty());
        }
    }
}
