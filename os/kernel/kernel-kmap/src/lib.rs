//! # Bounded High-Memory Mappings
//!
//! Frames above the direct map ("high memory") have no permanent kernel
//! virtual address. This crate lends them one out of a small, fixed window of
//! page-sized slots for as long as a caller holds the mapping.
//!
//! ```text
//!            ┌──────────────────────────────── Kmap ─────────────────────────┐
//!  frame ───►│ below lowmem_end?  ── yes ──► hhdm_base + pa (no slot)        │
//!            │        │ no                                                   │
//!            │        ▼                                                      │
//!            │ ┌──────────────────────────── Pkmap ────────────────────────┐ │
//!            │ │ reverse pointer hit?  ── yes ──► same slot, +1 holder     │ │
//!            │ │        │ no                                               │ │
//!            │ │        ▼                                                  │ │
//!            │ │ scan from cursor ──► free slot ──► program PTE, Held(1)   │ │
//!            │ │        │ at slot 0: unmap all stale slots, one TLB flush  │ │
//!            │ │        │ nothing free                                     │ │
//!            │ │        ▼                                                  │ │
//!            │ │ sleep on the wait queue, retry from the top               │ │
//!            │ └───────────────────────────────────────────────────────────┘ │
//!            └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Slot life cycle
//!
//! Every slot is [`SlotState::Free`], [`SlotState::Stale`] or
//! [`SlotState::Held`]. Releasing the last holder leaves the slot stale: its
//! PTE stays in place and may still be cached by any CPU. Stale slots return
//! to free only in a batched invalidation pass, which clears all of their PTEs
//! and then invalidates the whole window once. A stale slot is still bound to
//! its frame, so mapping that frame again revives the slot without touching
//! the page table.
//!
//! ## Guarantees
//!
//! - A frame is bound to at most one slot, and a slot to at most one frame.
//! - A slot is never rebound before its previous translation was invalidated.
//! - Mapping never fails. When every slot is held the caller waits, and
//!   waiters are woken in arrival order as slots are released.
//!
//! Releases must balance acquires; the allocator detects releasing a slot that
//! is not held and reports it as [`KmapError::NotHeld`].
//!
//! ## Example
//!
//! ```
//! use kernel_kmap::{PageAddressTable, Pkmap, PkmapConfig, SlotState};
//! use kernel_memory_addresses::PhysicalPage;
//! use kernel_vmem::{PkmapPageTable, RecordingFlush};
//!
//! type SmallPkmap = Pkmap<PkmapPageTable<RecordingFlush>, PageAddressTable<4>, 4>;
//!
//! let pkmap = SmallPkmap::with_flush(PkmapConfig::default(), RecordingFlush::default())
//!     .expect("default window is aligned");
//!
//! let frame = PhysicalPage::from_number(0x10_0000);
//! let va = pkmap.acquire(frame);
//! assert_eq!(pkmap.acquire(frame), va);
//! assert_eq!(pkmap.slot_state(0).holders(), 2);
//!
//! pkmap.release(va);
//! pkmap.release(va);
//! assert_eq!(pkmap.slot_state(0), SlotState::Stale(frame));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
mod kmap;
mod page_address;
mod pkmap;
mod slot;

pub use crate::error::KmapError;
pub use crate::kmap::{Kmap, KmapConfig, KmapGuard};
pub use crate::page_address::{FrameAddressMap, PageAddressTable};
pub use crate::pkmap::{Pkmap, PkmapConfig, PkmapGuard, PkmapStats};
pub use crate::slot::SlotState;

/// The kernel's allocator: the default window backed by `invlpg`.
#[cfg(target_arch = "x86_64")]
pub type KernelKmap = Kmap<
    kernel_vmem::PkmapPageTable<kernel_vmem::InvlpgFlush>,
    PageAddressTable<{ kernel_info::memory::LAST_PKMAP }>,
    { kernel_info::memory::LAST_PKMAP },
>;
