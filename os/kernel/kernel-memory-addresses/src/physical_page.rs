use crate::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// A 4 KiB physical frame.
///
/// Stores the page-aligned base address; the low [`PAGE_SHIFT`] bits are
/// always zero. This is the frame handle the kmap allocator binds to slots.
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let frame = PhysicalPage::containing(PhysicalAddress::new(0x4000_0123));
/// assert_eq!(frame.base().as_u64(), 0x4000_0000);
/// assert_eq!(frame.number(), 0x4_0000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(u64);

impl PhysicalPage {
    /// The frame that contains `pa` (offset bits are dropped).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u64() & !(PAGE_SIZE - 1))
    }

    /// Build from a page frame number (`base >> 12`).
    #[inline]
    #[must_use]
    pub const fn from_number(pfn: u64) -> Self {
        Self(pfn << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0)
    }

    /// Page frame number.
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0 >> PAGE_SHIFT
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:#018X})", self.0)
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}
