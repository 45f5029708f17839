use crate::{RawLock, RawUnlock};
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

/// A mutual-exclusion lock over `T`, generic over the raw lock `R`.
///
/// The guard returned by [`Mutex::lock`] is also the token a
/// [`WaitQueue`](crate::WaitQueue) needs to park the caller and to prove the
/// lock is held when notifying.
pub struct Mutex<T, R> {
    raw: R,
    value: UnsafeCell<T>,
}

// SAFETY: `value` is only reachable through a guard, and `raw` admits one
// guard at a time.
unsafe impl<T: Send, R: Sync> Sync for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    pub const fn from_raw(raw: R, value: T) -> Self {
        Self {
            raw,
            value: UnsafeCell::new(value),
        }
    }

    /// Access without locking; `&mut self` already excludes everyone else.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T, R> Mutex<T, R>
where
    R: RawLock + RawUnlock,
{
    /// Spin until the lock is ours.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.raw_lock();
        MutexGuard { mutex: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw
            .raw_try_lock()
            .then(|| MutexGuard { mutex: self })
    }

    /// Run `f` with the lock held.
    #[inline]
    pub fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        f(&mut self.lock())
    }
}

/// Proof that the lock is held; unlocks on drop.
pub struct MutexGuard<'a, T, R>
where
    R: RawUnlock,
{
    mutex: &'a Mutex<T, R>,
}

impl<'a, T, R> MutexGuard<'a, T, R>
where
    R: RawUnlock,
{
    /// The mutex this guard locks; used to re-acquire after a wait.
    #[inline]
    pub(crate) const fn mutex(&self) -> &'a Mutex<T, R> {
        self.mutex
    }
}

impl<T, R> Deref for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T, R> DerefMut for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock, and `&mut self` makes this the only borrow.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T, R> Drop for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    fn drop(&mut self) {
        // SAFETY: a guard only exists while its lock is held.
        unsafe { self.mutex.raw.raw_unlock() }
    }
}
