//! # Slot state
//!
//! A slot moves through `Free → Held(n) → Stale → Free → …` for the life of
//! the system. Only the invalidation pass may turn `Stale` back into `Free`:
//! a stale slot's translation may still sit in some CPU's TLB.
//!
//! The classic encoding is a single counter (`0` free, `1` stale, `n` held by
//! `n - 1`); [`SlotState::count`] reproduces it for diagnostics.

use core::num::NonZeroUsize;
use kernel_memory_addresses::PhysicalPage;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    /// Unmapped and invalidated since its last use; may be bound right away.
    #[default]
    Free,
    /// No holders, but the PTE is still programmed and may be cached.
    Stale(PhysicalPage),
    /// Bound to `frame` on behalf of `holders` callers.
    Held {
        frame: PhysicalPage,
        holders: NonZeroUsize,
    },
}

impl SlotState {
    /// Counter encoding: `0` free, `1` stale, `holders + 1` when held.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Free => 0,
            Self::Stale(_) => 1,
            Self::Held { holders, .. } => holders.get() + 1,
        }
    }

    /// The bound frame, for stale and held slots.
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage> {
        match self {
            Self::Free => None,
            Self::Stale(frame) | Self::Held { frame, .. } => Some(frame),
        }
    }

    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }

    #[must_use]
    pub const fn is_stale(self) -> bool {
        matches!(self, Self::Stale(_))
    }

    #[must_use]
    pub const fn is_held(self) -> bool {
        matches!(self, Self::Held { .. })
    }

    /// Number of current holders (zero unless held).
    #[must_use]
    pub const fn holders(self) -> usize {
        match self {
            Self::Held { holders, .. } => holders.get(),
            _ => 0,
        }
    }

    /// `Free → Held(1)`.
    ///
    /// # Panics
    /// The slot is not free.
    pub(crate) fn bind(&mut self, frame: PhysicalPage) {
        assert!(self.is_free(), "binding {frame} to a {self:?} slot");
        *self = Self::Held {
            frame,
            holders: NonZeroUsize::MIN,
        };
    }

    /// `Stale → Held(1)` or `Held(n) → Held(n + 1)`.
    ///
    /// # Panics
    /// The slot is free; a frame's reverse pointer never names a free slot.
    pub(crate) fn get(&mut self) {
        *self = match *self {
            Self::Stale(frame) => Self::Held {
                frame,
                holders: NonZeroUsize::MIN,
            },
            Self::Held { frame, holders } => Self::Held {
                frame,
                holders: holders.saturating_add(1),
            },
            Self::Free => panic!("reverse pointer names a free kmap slot"),
        };
    }

    /// Drop one holder. Returns `Ok(true)` when the last holder left and the
    /// slot became stale.
    ///
    /// # Errors
    /// The slot is not held; the current state is returned unchanged.
    pub(crate) fn put(&mut self) -> Result<bool, Self> {
        match *self {
            Self::Held { frame, holders } => {
                if let Some(holders) = NonZeroUsize::new(holders.get() - 1) {
                    *self = Self::Held { frame, holders };
                    Ok(false)
                } else {
                    *self = Self::Stale(frame);
                    Ok(true)
                }
            }
            state => Err(state),
        }
    }

    /// `Stale → Free`, returning the frame that was bound.
    pub(crate) fn reclaim(&mut self) -> Option<PhysicalPage> {
        match *self {
            Self::Stale(frame) => {
                *self = Self::Free;
                Some(frame)
            }
            _ => None,
        }
    }
}
