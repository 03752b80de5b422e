//! Keyboard lock state machine
//!
//! The receive loop reports host signals (input inhibited / input enabled);
//! automation callers block until the keyboard unlocks or until a full
//! lock-then-unlock cycle has happened. Waiters are woken by the transition
//! itself through a oneshot channel, so a lock/unlock pair arriving in one
//! burst is never missed. Only signals and submissions change state; a
//! deadline expiring only removes the waiter that owned it.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::core::error::{Error, Result, WaitPhase};

/// Transitions kept for diagnostics
const MAX_HISTORY: usize = 64;

/// Whether the host accepts input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyboardMode {
    /// Host accepts input
    Unlocked,
    /// Host is processing, input inhibited
    Locked,
}

/// Host control signal observed by the receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// Input inhibited
    InputInhibited,
    /// Input enabled
    InputEnabled,
}

/// Recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardTransition {
    /// State before
    pub from: KeyboardMode,
    /// State after
    pub to: KeyboardMode,
    /// When it happened
    pub timestamp: DateTime<Local>,
}

/// Progress of the cycle started by the most recent submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleProgress {
    AwaitingLock,
    AwaitingUnlock,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaiterKind {
    /// Released by the next unlock
    UnlockOnly,
    /// Needs a lock and then an unlock
    Cycle,
}

struct Waiter {
    kind: WaiterKind,
    phase: WaitPhase,
    tx: oneshot::Sender<Result<()>>,
}

struct Inner {
    mode: KeyboardMode,
    closed: Option<String>,
    cycle: Option<CycleProgress>,
    waiters: HashMap<u64, Waiter>,
    next_id: u64,
    history: VecDeque<KeyboardTransition>,
}

/// Statistics about lock activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardStats {
    /// Number of lock transitions
    pub locks: u64,
    /// Number of unlock transitions
    pub unlocks: u64,
    /// Waits that hit their deadline
    pub timeouts: u64,
}

/// Keyboard lock state shared by the receive loop and the caller
pub struct KeyboardLock {
    inner: Mutex<Inner>,
    stats: Mutex<KeyboardStats>,
}

impl std::fmt::Debug for KeyboardLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("KeyboardLock")
            .field("mode", &inner.mode)
            .field("waiters", &inner.waiters.len())
            .field("closed", &inner.closed.is_some())
            .finish()
    }
}

impl KeyboardLock {
    /// Create in the given mode
    pub fn new(mode: KeyboardMode) -> Self {
        Self {
            inner: Mutex::new(Inner {
                mode,
                closed: None,
                cycle: None,
                waiters: HashMap::new(),
                next_id: 0,
                history: VecDeque::with_capacity(MAX_HISTORY),
            }),
            stats: Mutex::new(KeyboardStats::default()),
        }
    }

    /// Current mode
    pub fn mode(&self) -> KeyboardMode {
        self.inner.lock().mode
    }

    /// Whether input is inhibited
    pub fn is_locked(&self) -> bool {
        self.mode() == KeyboardMode::Locked
    }

    /// Number of callers currently blocked
    pub fn pending_waiters(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Lock activity counters
    pub fn stats(&self) -> KeyboardStats {
        *self.stats.lock()
    }

    /// Recent transitions, oldest first
    pub fn history(&self) -> Vec<KeyboardTransition> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Record that a submit-class key is about to be sent. A later
    /// `wait_for_lock_cycle` measures the cycle from this point, even if the
    /// host answers before the caller starts waiting.
    pub fn note_submission(&self) {
        let mut inner = self.inner.lock();
        if inner.closed.is_none() {
            inner.cycle = Some(CycleProgress::AwaitingLock);
        }
    }

    /// Apply a host signal. Returns true when the mode changed.
    pub fn signal(&self, signal: HostSignal) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed.is_some() {
            return false;
        }

        let to = match signal {
            HostSignal::InputInhibited => KeyboardMode::Locked,
            HostSignal::InputEnabled => KeyboardMode::Unlocked,
        };
        let from = inner.mode;
        if from == to {
            trace!("Keyboard already {:?}", to);
            if to == KeyboardMode::Locked {
                // A host record re-inhibiting input still counts as the lock half of a cycle
                Self::advance_to_unlock(&mut inner);
            }
            return false;
        }
        inner.mode = to;

        if inner.history.len() == MAX_HISTORY {
            inner.history.pop_front();
        }
        inner.history.push_back(KeyboardTransition {
            from,
            to,
            timestamp: Local::now(),
        });

        match to {
            KeyboardMode::Locked => {
                self.stats.lock().locks += 1;
                Self::advance_to_unlock(&mut inner);
            }
            KeyboardMode::Unlocked => {
                self.stats.lock().unlocks += 1;
                if inner.cycle == Some(CycleProgress::AwaitingUnlock) {
                    inner.cycle = Some(CycleProgress::Complete);
                }
                let released: Vec<u64> = inner
                    .waiters
                    .iter()
                    .filter(|(_, w)| w.phase == WaitPhase::AwaitingUnlock)
                    .map(|(id, _)| *id)
                    .collect();
                let mut unlock_waiter_released = false;
                for id in released {
                    if let Some(waiter) = inner.waiters.remove(&id) {
                        unlock_waiter_released |= waiter.kind == WaiterKind::UnlockOnly;
                        let _ = waiter.tx.send(Ok(()));
                    }
                }
                // An unlock wait that saw this round trip has used it up
                if unlock_waiter_released && inner.cycle == Some(CycleProgress::Complete) {
                    inner.cycle = None;
                }
            }
        }

        debug!("Keyboard {:?} -> {:?}", from, to);
        true
    }

    fn advance_to_unlock(inner: &mut Inner) {
        if inner.cycle == Some(CycleProgress::AwaitingLock) {
            inner.cycle = Some(CycleProgress::AwaitingUnlock);
        }
        for waiter in inner.waiters.values_mut() {
            if waiter.kind == WaiterKind::Cycle && waiter.phase == WaitPhase::AwaitingLock {
                waiter.phase = WaitPhase::AwaitingUnlock;
            }
        }
    }

    /// Wake every waiter with a state error; later waits fail immediately
    pub fn close(&self, reason: &str) {
        let mut inner = self.inner.lock();
        if inner.closed.is_none() {
            inner.closed = Some(reason.to_string());
        }
        inner.cycle = None;
        let woken = inner.waiters.len();
        for (_, waiter) in inner.waiters.drain() {
            let _ = waiter.tx.send(Err(Error::State(reason.to_string())));
        }
        if woken > 0 {
            debug!("Woke {} keyboard waiters: {}", woken, reason);
        }
    }

    /// Block until the keyboard is unlocked. Returns at once if it already is.
    /// Consumes any pending submission cycle, so a later `wait_for_lock_cycle`
    /// waits for fresh host activity.
    pub async fn wait_for_unlock(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let registration = {
            let mut inner = self.inner.lock();
            if let Some(reason) = &inner.closed {
                return Err(Error::State(reason.clone()));
            }
            inner.cycle = None;
            if inner.mode == KeyboardMode::Unlocked {
                return Ok(());
            }
            Self::register(&mut inner, WaiterKind::UnlockOnly, WaitPhase::AwaitingUnlock)
        };
        self.wait(registration, started, timeout).await
    }

    /// Block for a lock transition followed by an unlock transition, both
    /// within one deadline. Progress made since the last submission counts.
    /// When the keyboard is already locked, a host record that inhibits input
    /// again satisfies the lock half.
    pub async fn wait_for_lock_cycle(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let registration = {
            let mut inner = self.inner.lock();
            if let Some(reason) = &inner.closed {
                return Err(Error::State(reason.clone()));
            }
            let phase = match inner.cycle.take() {
                Some(CycleProgress::Complete) => return Ok(()),
                Some(CycleProgress::AwaitingUnlock) => WaitPhase::AwaitingUnlock,
                Some(CycleProgress::AwaitingLock) | None => WaitPhase::AwaitingLock,
            };
            Self::register(&mut inner, WaiterKind::Cycle, phase)
        };
        self.wait(registration, started, timeout).await
    }

    fn register(
        inner: &mut Inner,
        kind: WaiterKind,
        phase: WaitPhase,
    ) -> (u64, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.waiters.insert(id, Waiter { kind, phase, tx });
        (id, rx)
    }

    async fn wait(
        &self,
        (id, mut rx): (u64, oneshot::Receiver<Result<()>>),
        started: Instant,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = started + timeout;
        match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::State("keyboard lock dropped".to_string())),
            Err(_) => {
                let removed = self.inner.lock().waiters.remove(&id);
                match removed {
                    Some(waiter) => {
                        self.stats.lock().timeouts += 1;
                        Err(Error::Timeout {
                            phase: waiter.phase,
                            requested: timeout,
                            elapsed: started.elapsed(),
                        })
                    }
                    // Released between the deadline firing and the removal
                    None => rx
                        .try_recv()
                        .unwrap_or_else(|_| Err(Error::State("keyboard lock dropped".to_string()))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[tokio::test]
    async fn test_unlock_wait_returns_at_once_when_unlocked() {
        let lock = KeyboardLock::new(KeyboardMode::Unlocked);
        let mut fut = task::spawn(lock.wait_for_unlock(Duration::from_secs(30)));
        assert_ready_ok!(fut.poll());
    }

    #[tokio::test]
    async fn test_unlock_wait_released_by_signal() {
        let lock = KeyboardLock::new(KeyboardMode::Locked);
        let mut fut = task::spawn(lock.wait_for_unlock(Duration::from_secs(30)));
        assert_pending!(fut.poll());
        assert!(lock.signal(HostSignal::InputEnabled));
        assert!(fut.is_woken());
        assert_ready_ok!(fut.poll());
        assert_eq!(lock.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_wait_times_out() {
        let lock = KeyboardLock::new(KeyboardMode::Locked);
        let err = lock
            .wait_for_unlock(Duration::from_millis(250))
            .await
            .unwrap_err();
        match err {
            Error::Timeout { phase, requested, elapsed } => {
                assert_eq!(phase, WaitPhase::AwaitingUnlock);
                assert_eq!(requested, Duration::from_millis(250));
                assert!(elapsed >= requested);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(lock.pending_waiters(), 0);
        assert_eq!(lock.stats().timeouts, 1);
        assert!(lock.is_locked(), "a deadline never changes the mode");
    }

    #[tokio::test]
    async fn test_cycle_needs_lock_before_unlock() {
        let lock = KeyboardLock::new(KeyboardMode::Locked);
        let mut fut = task::spawn(lock.wait_for_lock_cycle(Duration::from_secs(5)));
        assert_pending!(fut.poll());

        // Unlock without a preceding lock does not complete the cycle
        lock.signal(HostSignal::InputEnabled);
        assert_pending!(fut.poll());

        lock.signal(HostSignal::InputInhibited);
        assert_pending!(fut.poll());
        lock.signal(HostSignal::InputEnabled);
        assert_ready_ok!(fut.poll());
    }

    #[tokio::test]
    async fn test_fast_burst_after_submission_is_not_missed() {
        let lock = KeyboardLock::new(KeyboardMode::Unlocked);
        lock.note_submission();
        // Host answers before the caller starts waiting
        lock.signal(HostSignal::InputInhibited);
        lock.signal(HostSignal::InputEnabled);

        let mut fut = task::spawn(lock.wait_for_lock_cycle(Duration::from_secs(5)));
        assert_ready_ok!(fut.poll());
    }

    #[tokio::test]
    async fn test_half_cycle_before_wait_resumes_at_unlock() {
        let lock = KeyboardLock::new(KeyboardMode::Unlocked);
        lock.note_submission();
        lock.signal(HostSignal::InputInhibited);

        let mut fut = task::spawn(lock.wait_for_lock_cycle(Duration::from_secs(5)));
        assert_pending!(fut.poll());
        lock.signal(HostSignal::InputEnabled);
        assert_ready_ok!(fut.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_wait_uses_up_the_cycle() {
        let lock = KeyboardLock::new(KeyboardMode::Unlocked);
        lock.note_submission();
        lock.signal(HostSignal::InputInhibited);
        lock.signal(HostSignal::InputEnabled);
        lock.wait_for_unlock(Duration::from_millis(100)).await.unwrap();

        let err = lock
            .wait_for_lock_cycle(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout { phase: WaitPhase::AwaitingLock, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_unlock_wait_uses_up_the_cycle() {
        let lock = Arc::new(KeyboardLock::new(KeyboardMode::Locked));
        let waiter = tokio::spawn({
            let lock = lock.clone();
            async move { lock.wait_for_unlock(Duration::from_secs(5)).await }
        });
        while lock.pending_waiters() == 0 {
            tokio::task::yield_now().await;
        }
        // Submission and its whole round trip happen while the unlock wait is pending
        lock.note_submission();
        lock.signal(HostSignal::InputInhibited);
        lock.signal(HostSignal::InputEnabled);
        waiter.await.unwrap().unwrap();

        let err = lock
            .wait_for_lock_cycle(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout { phase: WaitPhase::AwaitingLock, .. }
        ));
    }

    #[tokio::test]
    async fn test_repeated_inhibit_counts_as_lock() {
        let lock = KeyboardLock::new(KeyboardMode::Locked);
        let mut fut = task::spawn(lock.wait_for_lock_cycle(Duration::from_secs(5)));
        assert_pending!(fut.poll());

        // Already locked: no transition, but the cycle moves on
        assert!(!lock.signal(HostSignal::InputInhibited));
        assert_pending!(fut.poll());
        assert!(lock.signal(HostSignal::InputEnabled));
        assert_ready_ok!(fut.poll());
        assert_eq!(lock.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_timeout_reports_phase() {
        let lock = KeyboardLock::new(KeyboardMode::Unlocked);
        lock.note_submission();
        let err = lock
            .wait_for_lock_cycle(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout { phase: WaitPhase::AwaitingLock, .. }
        ));

        lock.note_submission();
        lock.signal(HostSignal::InputInhibited);
        let err = lock
            .wait_for_lock_cycle(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout { phase: WaitPhase::AwaitingUnlock, .. }
        ));
    }

    #[tokio::test]
    async fn test_close_wakes_all_waiters() {
        let lock = Arc::new(KeyboardLock::new(KeyboardMode::Locked));
        let a = tokio::spawn({
            let lock = lock.clone();
            async move { lock.wait_for_unlock(Duration::from_secs(60)).await }
        });
        let b = tokio::spawn({
            let lock = lock.clone();
            async move { lock.wait_for_lock_cycle(Duration::from_secs(60)).await }
        });
        while lock.pending_waiters() < 2 {
            tokio::task::yield_now().await;
        }

        lock.close("session disconnected");
        assert!(matches!(a.await.unwrap(), Err(Error::State(_))));
        assert!(matches!(b.await.unwrap(), Err(Error::State(_))));

        let err = lock.wait_for_unlock(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), "state");
        assert!(!lock.signal(HostSignal::InputEnabled));
    }

    #[test]
    fn test_history_records_transitions() {
        let lock = KeyboardLock::new(KeyboardMode::Unlocked);
        assert!(!lock.signal(HostSignal::InputEnabled));
        lock.signal(HostSignal::InputInhibited);
        lock.signal(HostSignal::InputEnabled);
        let history = lock.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to, KeyboardMode::Locked);
        assert_eq!(history[1].to, KeyboardMode::Unlocked);
        assert_eq!(lock.stats(), KeyboardStats { locks: 1, unlocks: 1, timeouts: 0 });
    }
}
