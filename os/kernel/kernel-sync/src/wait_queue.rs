use crate::{MutexGuard, RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// FIFO condition queue layered under a [`Mutex`](crate::Mutex).
///
/// Waiters draw a ticket while holding the mutex, drop the mutex, spin until
/// their ticket is served, and re-acquire the mutex before returning. Tickets
/// are served strictly in the order they were drawn, one per
/// [`notify_one`](Self::notify_one).
///
/// Both drawing a ticket and serving one happen while the associated mutex is
/// held, so a notification can never slip in between "decide to sleep" and
/// "sleep": a waiter that drew its ticket before a notification will observe it.
///
/// Waiters park by spinning on their ticket; nothing here suspends a thread.
/// A scheduler-backed queue can replace the loop in [`wait`](Self::wait)
/// without changing the ticket protocol.
///
/// All calls on one queue must use the **same** mutex.
///
/// ```
/// use kernel_sync::{SpinMutex, WaitQueue};
///
/// let m = SpinMutex::new(0_u32);
/// let q = WaitQueue::new();
///
/// let g = m.lock();
/// // nobody is waiting, the notification is dropped
/// assert!(!q.notify_one(&g));
/// assert_eq!(q.waiters(), 0);
/// ```
pub struct WaitQueue {
    /// Next ticket to hand out.
    next: AtomicUsize,
    /// Number of tickets served so far; ticket `t` may proceed once `served > t`.
    served: AtomicUsize,
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            served: AtomicUsize::new(0),
        }
    }

    /// Release the lock held by `guard`, spin until notified, and
    /// re-acquire the lock.
    ///
    /// The protected state may have changed arbitrarily in between; callers
    /// must re-validate whatever condition made them wait.
    pub fn wait<'a, T, R>(&self, guard: MutexGuard<'a, T, R>) -> MutexGuard<'a, T, R>
    where
        R: RawLock + RawUnlock,
    {
        let mutex = guard.mutex();
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        drop(guard);

        while !self.is_served(ticket) {
            spin_loop();
        }

        mutex.lock()
    }

    /// Wake the longest-waiting caller, if any.
    ///
    /// The guard proves the queue's mutex is held. Returns `false` if nobody
    /// was waiting (the notification is not remembered).
    pub fn notify_one<T, R>(&self, _held: &MutexGuard<'_, T, R>) -> bool
    where
        R: RawUnlock,
    {
        let served = self.served.load(Ordering::Relaxed);
        if served == self.next.load(Ordering::Relaxed) {
            return false;
        }
        self.served.store(served.wrapping_add(1), Ordering::Release);
        true
    }

    /// Wake every current waiter; returns how many were woken.
    pub fn notify_all<T, R>(&self, _held: &MutexGuard<'_, T, R>) -> usize
    where
        R: RawUnlock,
    {
        let next = self.next.load(Ordering::Relaxed);
        let woken = next.wrapping_sub(self.served.load(Ordering::Relaxed));
        self.served.store(next, Ordering::Release);
        woken
    }

    /// Number of callers that drew a ticket and have not been notified yet.
    #[must_use]
    pub fn waiters(&self) -> usize {
        let served = self.served.load(Ordering::Acquire);
        self.next.load(Ordering::Acquire).wrapping_sub(served)
    }

    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    fn is_served(&self, ticket: usize) -> bool {
        // wrapping distance; outstanding tickets never come close to isize::MAX
        self.served.load(Ordering::Acquire).wrapping_sub(ticket) as isize > 0
    }
}
