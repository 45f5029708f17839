//! # Memory Layout

use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// End of userspace VA range after which Kernel space begins.
pub const LAST_USERSPACE_ADDRESS: u64 = 0xffff_0000_0000_0000;

/// A simple Higher Half Direct Map (HHDM) base.
/// Physical memory below [`LOWMEM_END`] is reachable at [`HHDM_BASE`] + `pa`.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// End (exclusive) of the physical range covered by the direct map.
///
/// Frames at or above this address are "high memory" and need a kmap slot.
pub const LOWMEM_END: u64 = 0x3800_0000; // 896 MiB

/// Base of the permanent kmap window.
///
/// Must be 2 MiB aligned: the whole window is served by a single leaf page table.
pub const PKMAP_BASE: u64 = 0xffff_fe00_0000_0000;

/// Number of permanent kmap slots (one leaf page table worth of entries).
pub const LAST_PKMAP: usize = 512;

/// End (exclusive) of the permanent kmap window.
pub const PKMAP_END: u64 = PKMAP_BASE + LAST_PKMAP as u64 * PAGE_SIZE;

/// Where the kernel executes (VMA), matches your linker script.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Virtual address of kmap slot `nr` in the default window.
#[inline]
#[must_use]
pub const fn pkmap_addr(nr: usize) -> VirtualAddress {
    VirtualAddress::new(PKMAP_BASE + nr as u64 * PAGE_SIZE)
}

/// Slot number of a virtual address inside the default window.
#[inline]
#[must_use]
pub const fn pkmap_nr(va: VirtualAddress) -> usize {
    ((va.as_u64() - PKMAP_BASE) / PAGE_SIZE) as usize
}

const _: () = {
    assert!(HHDM_BASE >= LAST_USERSPACE_ADDRESS);
    assert!(HHDM_BASE + LOWMEM_END <= PKMAP_BASE);
    assert!(PKMAP_BASE.is_multiple_of(2 * 1024 * 1024));
    assert!(LAST_PKMAP.is_power_of_two() && LAST_PKMAP <= 512);
    assert!(PKMAP_END <= KERNEL_BASE);
    assert!(LOWMEM_END.is_multiple_of(PAGE_SIZE));
};
