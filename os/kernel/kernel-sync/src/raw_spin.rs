use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Test-and-test-and-set spin lock.
///
/// Unfair: a releasing CPU may win the lock straight back. Fairness for
/// callers that give up the lock to wait lives in [`WaitQueue`](crate::WaitQueue).
pub struct RawSpin {
    locked: AtomicBool,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Whether somebody holds the lock right now. Racy; diagnostics only.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    #[inline]
    fn acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        while !self.acquire() {
            // wait on a plain load so the cache line stays shared
            while self.is_locked() {
                spin_loop();
            }
        }
    }

    fn raw_try_lock(&self) -> bool {
        !self.is_locked() && self.acquire()
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        debug_assert!(self.is_locked(), "unlocking an unlocked spin lock");
        self.locked.store(false, Ordering::Release);
    }
}
