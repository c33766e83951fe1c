//! Lock-action dispatch: an ordered fallback chain of strategies,
//! guarded by a process-wide cooldown and followed by a deferred
//! verification pass.
//!
//! Strategies return a result with a reason instead of throwing; the
//! dispatcher iterates and short-circuits on the first success. When
//! every strategy fails, the chain simply runs again on the next
//! gesture.

use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default cooldown between lock dispatches, in milliseconds.
pub const LOCK_COOLDOWN_MS: u64 = 500;

/// Default delay before the deferred verification pass, in milliseconds.
pub const VERIFY_DELAY_MS: u64 = 800;

/// Milliseconds of monotonic time since process start.
///
/// The cooldown treats 0 as "never dispatched", matching the platform
/// uptime clock the original timestamps came from.
pub fn uptime_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// Why one lock strategy did not succeed.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("strategy unavailable: {0}")]
    Unavailable(&'static str),

    #[error("permission denied")]
    PermissionDenied,

    #[error("platform call failed: {0}")]
    CallFailed(String),

    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Narrow seam to the platform power surface.
pub trait PowerControl: Send + Sync {
    /// Shell-tier sleep call; needs the elevated power permission.
    fn go_to_sleep(&self, uptime_ms: u64) -> Result<(), AttemptError>;

    /// Lower-privilege sleep call, more commonly available.
    fn user_sleep(&self, uptime_ms: u64) -> Result<(), AttemptError>;

    /// Whether the display is still interactive/awake.
    fn is_interactive(&self) -> Result<bool, AttemptError>;
}

/// One way of turning the screen off.
pub trait LockStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap pre-check; unavailable strategies are skipped without
    /// counting as failures.
    fn available(&self) -> bool {
        true
    }

    fn attempt(&self) -> Result<(), AttemptError>;
}

/// Direct privileged sleep via the platform power surface.
pub struct PrivilegedSleepStrategy {
    power: Arc<dyn PowerControl>,
}

impl PrivilegedSleepStrategy {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self { power }
    }
}

impl LockStrategy for PrivilegedSleepStrategy {
    fn name(&self) -> &'static str {
        "privileged-sleep"
    }

    fn attempt(&self) -> Result<(), AttemptError> {
        self.power.go_to_sleep(uptime_ms())
    }
}

/// Lower-privilege sleep via the platform power surface.
pub struct UserSleepStrategy {
    power: Arc<dyn PowerControl>,
}

impl UserSleepStrategy {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self { power }
    }
}

impl LockStrategy for UserSleepStrategy {
    fn name(&self) -> &'static str {
        "user-sleep"
    }

    fn attempt(&self) -> Result<(), AttemptError> {
        self.power.user_sleep(uptime_ms())
    }
}

/// Spawn an external command as a lock fallback. Fire-and-forget: the
/// exit status is not awaited or parsed, only spawn failures count.
pub struct CommandStrategy {
    name: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    available: bool,
}

impl CommandStrategy {
    pub fn new(name: &'static str, program: &'static str, args: &'static [&'static str]) -> Self {
        let available = Self::probe(program);
        if !available {
            debug!(strategy = name, program, "command not found on PATH");
        }
        Self {
            name,
            program,
            args,
            available,
        }
    }

    /// Power-key injection via the platform input shell tool.
    pub fn keyevent_power() -> Self {
        Self::new("input-keyevent", "input", &["keyevent", "26"])
    }

    /// Root-elevated power-key injection.
    pub fn root_keyevent_power() -> Self {
        let mut strategy = Self::new("root-keyevent", "su", &["-c", "input keyevent 26"]);
        // Pointless to shell out to su when already root; the plain
        // keyevent strategy covers that case.
        if unsafe { libc::getuid() } == 0 {
            strategy.available = false;
        }
        strategy
    }

    fn probe(program: &str) -> bool {
        Command::new("which")
            .arg(program)
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl LockStrategy for CommandStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn available(&self) -> bool {
        self.available
    }

    fn attempt(&self) -> Result<(), AttemptError> {
        Command::new(self.program)
            .args(self.args)
            .spawn()
            .map(|_| ())
            .map_err(|e| AttemptError::CommandFailed(format!("{}: {}", self.program, e)))
    }
}

/// Shared last-dispatch timestamp guarding against duplicate triggers
/// from overlapping surface hooks. One instance per process, shared by
/// every detection site.
pub struct LockCooldown {
    window_ms: u64,
    last_ms: AtomicU64,
}

impl LockCooldown {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_ms: AtomicU64::new(0),
        }
    }

    /// Atomically claim a dispatch slot. Returns false when another
    /// detection already dispatched within the window; concurrent
    /// callers from different surface threads get at most one true.
    /// A claim at time 0 is stamped as 1 so the slot never reads back
    /// as unset.
    pub fn try_acquire(&self, now_ms: u64) -> bool {
        loop {
            let last = self.last_ms.load(Ordering::Acquire);
            if last != 0 && now_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
            match self.last_ms.compare_exchange(
                last,
                now_ms.max(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                // Lost the race; re-check against the winner's stamp.
                Err(_) => continue,
            }
        }
    }
}

/// Runs the strategy chain and schedules verification.
pub struct LockDispatcher {
    strategies: Vec<Box<dyn LockStrategy>>,
    cooldown: Arc<LockCooldown>,
    power: Option<Arc<dyn PowerControl>>,
    /// Escalation path taken when verification finds the screen still
    /// awake after a nominally successful dispatch.
    escalation: Option<Arc<dyn LockStrategy>>,
    verify_delay: Duration,
}

impl LockDispatcher {
    pub fn new(strategies: Vec<Box<dyn LockStrategy>>, cooldown: Arc<LockCooldown>) -> Self {
        Self {
            strategies,
            cooldown,
            power: None,
            escalation: None,
            verify_delay: Duration::from_millis(VERIFY_DELAY_MS),
        }
    }

    /// Enable the deferred verification pass.
    pub fn with_verification(
        mut self,
        power: Arc<dyn PowerControl>,
        escalation: Option<Arc<dyn LockStrategy>>,
        delay: Duration,
    ) -> Self {
        self.power = Some(power);
        self.escalation = escalation;
        self.verify_delay = delay;
        self
    }

    pub fn cooldown(&self) -> Arc<LockCooldown> {
        Arc::clone(&self.cooldown)
    }

    /// Dispatch a lock action: claim the cooldown, walk the chain,
    /// schedule verification. Returns whether any strategy reported
    /// success. Never blocks on verification.
    pub fn dispatch(&self, now_ms: u64) -> bool {
        if !self.cooldown.try_acquire(now_ms) {
            debug!("lock dispatch suppressed by cooldown");
            return false;
        }
        let locked = self.run_chain();
        self.schedule_verification();
        locked
    }

    fn run_chain(&self) -> bool {
        for strategy in &self.strategies {
            if !strategy.available() {
                debug!(strategy = strategy.name(), "skipping unavailable strategy");
                continue;
            }
            match strategy.attempt() {
                Ok(()) => {
                    info!(strategy = strategy.name(), "lock action dispatched");
                    return true;
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "lock strategy failed");
                }
            }
        }
        // Not surfaced anywhere else; the next gesture retries the chain.
        error!("all lock strategies exhausted");
        false
    }

    /// Re-read interactive state a short delay after the attempt, off
    /// the interaction path. Still-awake escalates through the root
    /// command path; the outcome never affects the dispatch result.
    fn schedule_verification(&self) {
        let Some(power) = self.power.clone() else {
            return;
        };
        let escalation = self.escalation.clone();
        let delay = self.verify_delay;

        thread::spawn(move || {
            thread::sleep(delay);
            match power.is_interactive() {
                Ok(false) => debug!("lock verified, display no longer interactive"),
                Ok(true) => {
                    warn!("display still interactive after lock dispatch");
                    if let Some(strategy) = escalation {
                        if strategy.available() {
                            match strategy.attempt() {
                                Ok(()) => info!(strategy = strategy.name(), "escalation dispatched"),
                                Err(e) => {
                                    warn!(strategy = strategy.name(), error = %e, "escalation failed")
                                }
                            }
                        }
                    }
                }
                Err(e) => debug!(error = %e, "interactive state unavailable, skipping verification"),
            }
        });
    }
}

/// The standard fallback chain: privileged sleep (shell identity only),
/// user-tier sleep, then command injection with a root variant last.
pub fn default_chain(
    shell_identity: bool,
    power: Arc<dyn PowerControl>,
) -> Vec<Box<dyn LockStrategy>> {
    let mut chain: Vec<Box<dyn LockStrategy>> = Vec::new();
    if shell_identity {
        chain.push(Box::new(PrivilegedSleepStrategy::new(Arc::clone(&power))));
    }
    chain.push(Box::new(UserSleepStrategy::new(power)));
    chain.push(Box::new(CommandStrategy::keyevent_power()));
    chain.push(Box::new(CommandStrategy::root_keyevent_power()));
    chain
}
