//! # Kernel synchronization primitives
//!
//! A raw-lock-parameterized [`Mutex`] and the [`WaitQueue`] used to park
//! callers that must sleep until another holder gives something back.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod mutex;
mod raw_spin;
mod wait_queue;

pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use wait_queue::WaitQueue;

/// The lock the kmap allocator guards its slot table with.
pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

/// Lock side of a raw, data-less lock.
pub trait RawLock {
    /// Block until the lock is held by the caller.
    fn raw_lock(&self);

    /// Take the lock if it is free; never blocks.
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must hold the lock.
    unsafe fn raw_unlock(&self);
}
