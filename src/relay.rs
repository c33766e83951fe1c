//! Cross-process lock signal relay.
//!
//! A process that cannot perform the lock itself (the launcher) sends a
//! one-way, zero-payload signal on a well-known channel; the privileged
//! shell process listens on that channel and runs the same dispatcher
//! as for a locally detected double-tap. Registration on the receiving
//! side happens exactly once per process lifetime.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use tracing::{debug, info, warn};

use crate::dispatcher::{uptime_ms, LockDispatcher};
use crate::NavTapError;

/// Well-known system-wide channel name for the lock signal.
pub const LOCK_CHANNEL: &str = "com.navbardoubletap2lock.LOCK_SCREEN";

/// Zero-payload lock request.
#[derive(Debug, Clone, Copy)]
pub struct LockSignal;

/// Fire-and-forget sender side of the relay.
pub trait SignalSender: Send + Sync {
    fn send_lock_signal(&self) -> Result<(), NavTapError>;
}

/// Sends the signal by spawning the platform broadcast command. The
/// broadcast is system-wide; delivery is not acknowledged.
pub struct BroadcastCommandSender {
    program: &'static str,
}

impl BroadcastCommandSender {
    pub fn new() -> Self {
        Self { program: "am" }
    }
}

impl Default for BroadcastCommandSender {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSender for BroadcastCommandSender {
    fn send_lock_signal(&self) -> Result<(), NavTapError> {
        debug!(channel = LOCK_CHANNEL, "sending lock broadcast");
        Command::new(self.program)
            .args(["broadcast", "-a", LOCK_CHANNEL])
            .spawn()
            .map(|_| ())
            .map_err(|e| NavTapError::Relay(format!("{}: {}", self.program, e)))
    }
}

/// In-process channel pair, used by the harness and by hosts that
/// bridge the platform broadcast into the engine themselves.
pub struct MpscSignalSender {
    sender: mpsc::Sender<LockSignal>,
}

impl SignalSender for MpscSignalSender {
    fn send_lock_signal(&self) -> Result<(), NavTapError> {
        self.sender
            .send(LockSignal)
            .map_err(|e| NavTapError::Channel(e.to_string()))
    }
}

/// Create an in-process signal channel and return both ends.
pub fn signal_channel() -> (MpscSignalSender, mpsc::Receiver<LockSignal>) {
    let (sender, receiver) = mpsc::channel();
    (MpscSignalSender { sender }, receiver)
}

/// Receiving side: invokes the shared dispatcher on every signal.
pub struct RelayReceiver {
    dispatcher: Arc<LockDispatcher>,
    registered: AtomicBool,
}

impl RelayReceiver {
    pub fn new(dispatcher: Arc<LockDispatcher>) -> Self {
        Self {
            dispatcher,
            registered: AtomicBool::new(false),
        }
    }

    /// Claim the one registration this process gets. The host calls
    /// this before wiring its platform listener; a second caller gets
    /// false and must not register again.
    pub fn try_register(&self) -> bool {
        let first = !self.registered.swap(true, Ordering::SeqCst);
        if first {
            info!(channel = LOCK_CHANNEL, "lock signal receiver registered");
        } else {
            debug!("lock signal receiver already registered, ignoring");
        }
        first
    }

    /// Handle one received signal as if the double-tap had been
    /// detected locally.
    pub fn on_signal(&self) {
        info!("lock signal received");
        self.dispatcher.dispatch(uptime_ms());
    }

    /// Drain an in-process signal channel on a background thread.
    /// Returns `None` when this process already registered a receiver.
    pub fn spawn_pump(
        self: Arc<Self>,
        receiver: mpsc::Receiver<LockSignal>,
    ) -> Option<thread::JoinHandle<()>> {
        if !self.try_register() {
            return None;
        }
        Some(thread::spawn(move || {
            while receiver.recv().is_ok() {
                self.on_signal();
            }
            warn!("lock signal channel closed");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{AttemptError, LockCooldown, LockStrategy, LOCK_COOLDOWN_MS};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

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

    fn counting_dispatcher() -> (Arc<LockDispatcher>, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(LockDispatcher::new(
            vec![Box::new(CountingStrategy {
                attempts: Arc::clone(&attempts),
            })],
            Arc::new(LockCooldown::new(LOCK_COOLDOWN_MS)),
        ));
        (dispatcher, attempts)
    }

    #[test]
    fn registration_is_idempotent() {
        let (dispatcher, _) = counting_dispatcher();
        let receiver = RelayReceiver::new(dispatcher);
        assert!(receiver.try_register());
        assert!(!receiver.try_register());
        assert!(!receiver.try_register());
    }

    #[test]
    fn second_pump_is_refused() {
        let (dispatcher, _) = counting_dispatcher();
        let relay = Arc::new(RelayReceiver::new(dispatcher));
        let (_sender_a, receiver_a) = signal_channel();
        let (_sender_b, receiver_b) = signal_channel();
        assert!(Arc::clone(&relay).spawn_pump(receiver_a).is_some());
        assert!(relay.spawn_pump(receiver_b).is_none());
    }

    #[test]
    fn signal_invokes_the_dispatcher() {
        let (dispatcher, attempts) = counting_dispatcher();
        let relay = Arc::new(RelayReceiver::new(dispatcher));
        let (sender, receiver) = signal_channel();
        let handle = Arc::clone(&relay).spawn_pump(receiver);
        assert!(handle.is_some());

        sender.send_lock_signal().expect("send");
        // Give the pump thread a moment to drain.
        for _ in 0..50 {
            if attempts.load(Ordering::SeqCst) == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        drop(sender);
    }

    #[test]
    fn send_after_receiver_drop_reports_channel_error() {
        let (sender, receiver) = signal_channel();
        drop(receiver);
        assert!(matches!(
            sender.send_lock_signal(),
            Err(NavTapError::Channel(_))
        ));
    }
}
