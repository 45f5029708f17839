//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for the addresses the kmap subsystem juggles:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address in the kernel's (page-table translated) address space. |
//! | [`PhysicalAddress`] | An address in physical memory. |
//! | [`PhysicalPage`] | A 4 KiB physical frame, identified by its page-aligned base. |
//!
//! The wrappers are `#[repr(transparent)]` over `u64` and cost nothing at
//! runtime. They exist so that a frame handle cannot be passed where a slot
//! address is expected, and vice versa.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x1_2345_6789);
//! let frame = pa.page();
//! assert_eq!(frame.base().as_u64(), 0x1_2345_6000);
//! assert_eq!(frame.number(), 0x12_3456);
//!
//! let va = VirtualAddress::new(0xFFFF_FE00_0000_3000);
//! assert!(va.is_page_aligned());
//! assert_eq!(va.page_offset(), 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod physical_page;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;

/// Size of a base page / frame in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_number_round_trips_through_base() {
        let frame = PhysicalPage::from_number(0x4_0001);
        assert_eq!(frame.base().as_u64(), 0x4000_1000);
        assert_eq!(PhysicalPage::containing(frame.base()), frame);
    }

    #[test]
    fn containing_rounds_down() {
        let pa = PhysicalAddress::new(0x5555_0FFF);
        assert_eq!(PhysicalPage::containing(pa).base().as_u64(), 0x5555_0000);
    }

    #[test]
    fn virtual_alignment_helpers() {
        let va = VirtualAddress::new(0xFFFF_FE00_0000_1234);
        assert!(!va.is_page_aligned());
        assert_eq!(va.page_offset(), 0x234);
        assert_eq!(va.align_down().as_u64(), 0xFFFF_FE00_0000_1000);
        assert!(va.align_down().is_page_aligned());
    }

    #[test]
    fn virtual_address_arithmetic() {
        let va = VirtualAddress::new(0x1000);
        assert_eq!((va + PAGE_SIZE).as_u64(), 0x2000);
        assert_eq!(VirtualAddress::new(0x3000) - va, 0x2000);
        assert_eq!(va.checked_sub(VirtualAddress::new(0x2000)), None);
    }

    #[test]
    fn formatting_is_hex() {
        let va = VirtualAddress::new(0xFFFF_FE00_0000_0000);
        assert_eq!(format!("{va}"), "0xFFFFFE0000000000");
        assert_eq!(format!("{va:?}"), "VA(0xFFFFFE0000000000)");

        let frame = PhysicalPage::from_number(0x10);
        assert_eq!(format!("{frame:?}"), "PhysicalPage(0x0000000000010000)");
    }
}
