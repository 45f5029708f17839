//! # 4 KiB Page Table Entry
//!
//! Raw layout of an x86-64 L1 entry (PTE). The kmap window only ever uses
//! present, writable, global, no-execute 4 KiB leaves; see [`PtEntry::kmap_leaf`].
//!
//! | Bits   | Field              |
//! |--------|--------------------|
//! | 0      | present            |
//! | 1      | writable           |
//! | 2      | user_access        |
//! | 3      | write_through      |
//! | 4      | cache_disabled     |
//! | 5      | accessed           |
//! | 6      | dirty              |
//! | 7      | pat                |
//! | 8      | global_translation |
//! | 9–11   | OS available       |
//! | 12–51  | frame bits [51:12] |
//! | 52–62  | OS available / PKU |
//! | 63     | no_execute         |

use bitfield_struct::bitfield;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalAddress, PhysicalPage};

#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PtEntry {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2). Kernel-only mappings keep this clear.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write.
    pub dirty: bool,

    /// Page Attribute Table index bit (PAT, bit 7). At L1 this position is PAT, not PS.
    pub pat: bool,

    /// Global (G, bit 8).
    ///
    /// Survives CR3 reloads; such entries must be dropped with `invlpg`.
    pub global_translation: bool,

    #[bits(3)]
    pub os_available_low: u8,

    /// Physical frame bits [51:12].
    #[bits(40)]
    frame_bits: u64,

    #[bits(11)]
    pub os_available_high: u16,

    /// No-Execute (NX, bit 63).
    pub no_execute: bool,
}

impl PtEntry {
    /// A non-present entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// Kernel read/write data mapping of `frame`: present, writable, global, NX.
    #[inline]
    #[must_use]
    pub const fn kmap_leaf(frame: PhysicalPage) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_global_translation(true)
            .with_no_execute(true)
            .with_frame_bits(frame.number())
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        !self.present()
    }

    /// The mapped frame, if the entry is present.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage> {
        if self.present() {
            Some(PhysicalPage::containing(PhysicalAddress::new(
                self.frame_bits() << PAGE_SHIFT,
            )))
        } else {
            None
        }
    }
}
