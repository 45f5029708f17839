//! # Kernel Memory Layout
//!
//! Compile-time layout constants shared by the paging and kmap crates. Keeping
//! them in one crate means the page-table backend, the kmap allocator and the
//! kernel binary all agree on where the permanent-kmap window lives and which
//! physical frames are reachable through the direct map.
//!
//! ```text
//! Virtual Address Space Layout (64-bit):
//!
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │        User Space               │
//! LAST_USERSPACE_ADDRESS├─────────────────────────────────┤
//!                       │        Guard Region             │
//! HHDM_BASE             ├─────────────────────────────────┤
//!                       │   Direct map of [0, LOWMEM_END) │
//! PKMAP_BASE            ├─────────────────────────────────┤
//!                       │   Permanent kmap window         │
//!                       │   (LAST_PKMAP × 4 KiB slots)    │
//! PKMAP_END             ├─────────────────────────────────┤
//!                       │        Unused                   │
//! KERNEL_BASE           ├─────────────────────────────────┤
//!                       │       Kernel Space              │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! Frames at or above [`LOWMEM_END`](memory::LOWMEM_END) ("high memory") have
//! no permanent virtual address and must be mapped into the kmap window on
//! demand.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
