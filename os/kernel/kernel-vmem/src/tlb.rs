//! # TLB maintenance

use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// Drops cached translations for a range of virtual addresses.
pub trait TlbFlush {
    /// Invalidate every page in `[start, end)` on the executing CPU.
    fn flush_range(&mut self, start: VirtualAddress, end: VirtualAddress);
}

/// `invlpg` per page.
///
/// Kmap entries are global, so a CR3 reload would not drop them; each page is
/// invalidated explicitly instead.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Copy, Clone)]
pub struct InvlpgFlush;

#[cfg(target_arch = "x86_64")]
impl TlbFlush for InvlpgFlush {
    fn flush_range(&mut self, start: VirtualAddress, end: VirtualAddress) {
        let mut va = start.align_down().as_u64();
        while va < end.as_u64() {
            // SAFETY: invlpg has no memory effects besides dropping a TLB entry;
            // requires CPL0 like the rest of this crate.
            unsafe {
                core::arch::asm!("invlpg [{}]", in(reg) va, options(nostack, preserves_flags));
            }
            va += PAGE_SIZE;
        }
    }
}

/// Flush that only records what it was asked to do.
///
/// For hosted builds (tests, tooling) where no TLB exists.
#[derive(Debug, Default, Copy, Clone)]
pub struct RecordingFlush {
    ranges: usize,
    pages: u64,
    last: Option<(VirtualAddress, VirtualAddress)>,
}

impl RecordingFlush {
    /// Number of `flush_range` calls.
    #[must_use]
    pub const fn ranges(&self) -> usize {
        self.ranges
    }

    /// Total number of pages covered by all calls.
    #[must_use]
    pub const fn pages(&self) -> u64 {
        self.pages
    }

    /// The most recent range.
    #[must_use]
    pub const fn last(&self) -> Option<(VirtualAddress, VirtualAddress)> {
        self.last
    }
}

impl TlbFlush for RecordingFlush {
    fn flush_range(&mut self, start: VirtualAddress, end: VirtualAddress) {
        self.ranges += 1;
        self.pages += end.checked_sub(start).unwrap_or(0).div_ceil(PAGE_SIZE);
        self.last = Some((start, end));
    }
}
