//! # Direct-map front end
//!
//! Low frames are always reachable through the higher-half direct map at
//! `hhdm_base + pa`; only frames at or above `lowmem_end` need a kmap slot.
//! [`Kmap`] hides that split so callers can map any frame the same way.

use crate::page_address::{FrameAddressMap, PageAddressTable};
use crate::pkmap::{Pkmap, PkmapConfig, PkmapGuard};
use crate::KmapError;
use kernel_info::memory::{HHDM_BASE, LOWMEM_END};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_vmem::{KernelMapper, PkmapPageTable, TlbFlush, VmemError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KmapConfig {
    /// Virtual address of physical address zero in the direct map.
    pub hhdm_base: VirtualAddress,
    /// First physical address not covered by the direct map.
    pub lowmem_end: PhysicalAddress,
    pub pkmap: PkmapConfig,
}

impl Default for KmapConfig {
    fn default() -> Self {
        Self {
            hhdm_base: VirtualAddress::new(HHDM_BASE),
            lowmem_end: PhysicalAddress::new(LOWMEM_END),
            pkmap: PkmapConfig::default(),
        }
    }
}

/// Maps any frame into kernel virtual memory.
pub struct Kmap<B, M, const N: usize> {
    hhdm_base: VirtualAddress,
    lowmem_end: PhysicalAddress,
    pkmap: Pkmap<B, M, N>,
}

impl<F: TlbFlush, const N: usize> Kmap<PkmapPageTable<F>, PageAddressTable<N>, N> {
    /// # Errors
    /// The kmap window base is not aligned to a full page table.
    pub fn with_flush(config: KmapConfig, flush: F) -> Result<Self, VmemError> {
        let pkmap = Pkmap::with_flush(config.pkmap, flush)?;
        Ok(Self::from_pkmap(config, pkmap))
    }
}

impl<B: KernelMapper, M: FrameAddressMap, const N: usize> Kmap<B, M, N> {
    /// # Panics
    /// The kmap window base is not page aligned.
    pub fn new(config: KmapConfig, mapper: B, frames: M) -> Self {
        let pkmap = Pkmap::new(config.pkmap, mapper, frames);
        Self::from_pkmap(config, pkmap)
    }

    const fn from_pkmap(config: KmapConfig, pkmap: Pkmap<B, M, N>) -> Self {
        Self {
            hhdm_base: config.hhdm_base,
            lowmem_end: config.lowmem_end,
            pkmap,
        }
    }

    /// The slot allocator serving high frames.
    #[must_use]
    pub const fn pkmap(&self) -> &Pkmap<B, M, N> {
        &self.pkmap
    }

    /// Whether `frame` lies outside the direct map.
    #[must_use]
    pub fn is_highmem(&self, frame: PhysicalPage) -> bool {
        frame.base() >= self.lowmem_end
    }

    /// Kernel virtual address of `frame`.
    ///
    /// Low frames resolve through the direct map and never block. High frames
    /// take a kmap slot and may block; pair them with [`unmap`](Self::unmap).
    pub fn map(&self, frame: PhysicalPage) -> VirtualAddress {
        if self.is_highmem(frame) {
            self.pkmap.acquire(frame)
        } else {
            self.direct(frame)
        }
    }

    /// Undo a [`map`](Self::map).
    ///
    /// # Panics
    /// `address` is neither in the direct map nor a held kmap slot.
    pub fn unmap(&self, address: VirtualAddress) {
        if let Err(err) = self.try_unmap(address) {
            panic!("kunmap: {err}");
        }
    }

    /// Checked [`unmap`](Self::unmap). Direct-map addresses are accepted and ignored.
    ///
    /// # Errors
    /// See [`Pkmap::try_release`]; addresses outside both ranges are reported
    /// as [`KmapError::OutsideWindow`].
    pub fn try_unmap(&self, address: VirtualAddress) -> Result<(), KmapError> {
        if self.is_direct(address) {
            return Ok(());
        }
        self.pkmap.try_release(address)
    }

    /// [`map`](Self::map) with a guard that unmaps on drop.
    pub fn map_guarded(&self, frame: PhysicalPage) -> KmapGuard<'_, B, M, N> {
        if self.is_highmem(frame) {
            KmapGuard::Slot(self.pkmap.map(frame))
        } else {
            KmapGuard::Direct(self.direct(frame))
        }
    }

    /// Current address of `frame` without mapping it.
    ///
    /// High frames only have one while bound to a slot.
    pub fn page_address(&self, frame: PhysicalPage) -> Option<VirtualAddress> {
        if self.is_highmem(frame) {
            self.pkmap.page_address(frame)
        } else {
            Some(self.direct(frame))
        }
    }

    fn direct(&self, frame: PhysicalPage) -> VirtualAddress {
        self.hhdm_base + frame.base().as_u64()
    }

    fn is_direct(&self, address: VirtualAddress) -> bool {
        address
            .checked_sub(self.hhdm_base)
            .is_some_and(|offset| offset < self.lowmem_end.as_u64())
    }
}

/// A mapping obtained from [`Kmap::map_guarded`].
pub enum KmapGuard<'a, B: KernelMapper, M: FrameAddressMap, const N: usize> {
    /// Direct-map address; nothing to release.
    Direct(VirtualAddress),
    Slot(PkmapGuard<'a, B, M, N>),
}

impl<B: KernelMapper, M: FrameAddressMap, const N: usize> KmapGuard<'_, B, M, N> {
    #[must_use]
    pub const fn address(&self) -> VirtualAddress {
        match self {
            Self::Direct(va) => *va,
            Self::Slot(guard) => guard.address(),
        }
    }

    #[must_use]
    pub const fn as_ptr<T>(&self) -> *const T {
        self.address().as_ptr()
    }

    #[must_use]
    pub const fn as_mut_ptr<T>(&self) -> *mut T {
        self.address().as_mut_ptr()
    }
}
