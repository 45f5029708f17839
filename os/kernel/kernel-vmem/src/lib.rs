//! # Virtual Memory Support
//!
//! The paging primitives the kmap allocator consumes:
//!
//! - [`PtEntry`]: raw x86-64 4 KiB page table entry.
//! - [`PkmapPageTable`]: the single leaf table backing the kmap window.
//! - [`KernelMapper`]: program / clear one entry and invalidate a range.
//! - [`TlbFlush`]: the translation-cache side of invalidation, with an
//!   `invlpg` implementation for x86-64 and a [`RecordingFlush`] for hosted builds.
//!
//! ## Why a separate invalidation step?
//!
//! Clearing a PTE does not clear the TLB. A virtual address whose entry was
//! cleared may still translate to the old frame until it is invalidated, so a
//! freed kmap slot must not be rebound before that happens. Callers batch the
//! invalidation: clear many entries, then call
//! [`KernelMapper::invalidate_range`] once.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod pkmap_table;
mod pte;
mod tlb;

pub use crate::pkmap_table::{PT_ENTRIES, PT_SPAN, PkmapPageTable};
pub use crate::pte::PtEntry;
#[cfg(target_arch = "x86_64")]
pub use crate::tlb::InvlpgFlush;
pub use crate::tlb::{RecordingFlush, TlbFlush};

use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

/// Page-table write and invalidation primitives for a fixed window of kernel
/// virtual addresses.
///
/// None of these operations synchronize; callers serialize access.
pub trait KernelMapper {
    /// Map the 4 KiB page at `va` to `frame`.
    fn commit_mapping(&mut self, va: VirtualAddress, frame: PhysicalPage);

    /// Clear the entry at `va`, returning the frame it mapped, if any.
    ///
    /// The translation may still be cached until [`invalidate_range`](Self::invalidate_range).
    fn clear_mapping(&mut self, va: VirtualAddress) -> Option<PhysicalPage>;

    /// Drop cached translations for `[start, end)`.
    fn invalidate_range(&mut self, start: VirtualAddress, end: VirtualAddress);

    /// The frame currently mapped at `va`, if any.
    fn lookup(&self, va: VirtualAddress) -> Option<PhysicalPage>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmemError {
    #[error("window base {0} is not aligned to a full page table")]
    UnalignedWindow(VirtualAddress),
}
