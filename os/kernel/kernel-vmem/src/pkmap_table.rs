//! # Permanent kmap page table
//!
//! The kmap window is exactly one leaf page table: 512 PTEs covering 2 MiB
//! starting at a 2 MiB aligned base. [`PkmapPageTable`] owns those entries
//! and implements [`KernelMapper`] for them.
//!
//! Hooking the table's frame into the page directory that covers `base` is
//! done once at boot and is not this module's concern.

use crate::pte::PtEntry;
use crate::tlb::TlbFlush;
use crate::{KernelMapper, VmemError};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use log::trace;

/// Entries per leaf page table.
pub const PT_ENTRIES: usize = 512;

/// Bytes covered by one leaf page table.
pub const PT_SPAN: u64 = PT_ENTRIES as u64 * PAGE_SIZE;

#[repr(C, align(4096))]
struct Entries([PtEntry; PT_ENTRIES]);

/// The leaf page table backing the kmap window.
pub struct PkmapPageTable<F> {
    entries: Entries,
    base: VirtualAddress,
    flush: F,
}

impl<F: TlbFlush> PkmapPageTable<F> {
    /// Create an empty table for the window starting at `base`.
    ///
    /// # Errors
    /// `base` is not 2 MiB aligned.
    pub fn new(base: VirtualAddress, flush: F) -> Result<Self, VmemError> {
        if !base.as_u64().is_multiple_of(PT_SPAN) {
            return Err(VmemError::UnalignedWindow(base));
        }
        Ok(Self {
            entries: Entries([PtEntry::zero(); PT_ENTRIES]),
            base,
            flush,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    /// Index of `va` within this table, if `va` falls inside the window.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(&self, va: VirtualAddress) -> Option<usize> {
        match va.pages_since(self.base) {
            Some(nr) if nr < PT_ENTRIES as u64 => Some(nr as usize),
            _ => None,
        }
    }

    /// Read the entry mapping `va`.
    ///
    /// # Panics
    /// `va` is outside the window.
    #[must_use]
    pub fn entry(&self, va: VirtualAddress) -> PtEntry {
        self.entries.0[self.expect_index(va)]
    }

    /// Number of present entries.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.0.iter().filter(|e| e.present()).count()
    }

    #[must_use]
    pub const fn flusher(&self) -> &F {
        &self.flush
    }

    fn expect_index(&self, va: VirtualAddress) -> usize {
        match self.index_of(va) {
            Some(i) => i,
            None => panic!("{va} is outside the pkmap window at {}", self.base),
        }
    }
}

impl<F: TlbFlush> KernelMapper for PkmapPageTable<F> {
    fn commit_mapping(&mut self, va: VirtualAddress, frame: PhysicalPage) {
        let i = self.expect_index(va);
        debug_assert!(self.entries.0[i].is_none(), "{va} already mapped");
        self.entries.0[i] = PtEntry::kmap_leaf(frame);
    }

    fn clear_mapping(&mut self, va: VirtualAddress) -> Option<PhysicalPage> {
        let i = self.expect_index(va);
        let old = core::mem::replace(&mut self.entries.0[i], PtEntry::zero());
        old.frame()
    }

    fn invalidate_range(&mut self, start: VirtualAddress, end: VirtualAddress) {
        trace!("Invalidating TLB for {start}..{end}");
        self.flush.flush_range(start, end);
    }

    fn lookup(&self, va: VirtualAddress) -> Option<PhysicalPage> {
        self.entry(va).frame()
    }
}
