//! # Permanent kmap slots
//!
//! A fixed window of `N` page-sized virtual addresses, each of which can be
//! bound to one frame at a time. See the [crate docs](crate) for the slot life
//! cycle; this module holds the allocator proper.
//!
//! All slot state, the scan cursor, the page-table backend and the frame
//! reverse pointers sit behind a single spin lock. Callers that find every slot
//! busy park on a [`WaitQueue`] tied to that lock.

use crate::page_address::{FrameAddressMap, PageAddressTable};
use crate::{KmapError, SlotState};
use kernel_info::memory::PKMAP_BASE;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_sync::{MutexGuard, RawSpin, SpinMutex, WaitQueue};
use kernel_vmem::{KernelMapper, PT_ENTRIES, PkmapPageTable, TlbFlush, VmemError};
use log::{debug, trace};

/// Where the slot window lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PkmapConfig {
    /// Address of slot 0. Page aligned; slot `nr` lives at `base + nr * 4 KiB`.
    pub base: VirtualAddress,
}

impl Default for PkmapConfig {
    fn default() -> Self {
        Self {
            base: VirtualAddress::new(PKMAP_BASE),
        }
    }
}

/// Point-in-time view of the slot table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PkmapStats {
    pub free: usize,
    pub stale: usize,
    pub held: usize,
    /// Sum of holders over all held slots.
    pub holders: usize,
    /// Invalidation passes run so far.
    pub flushes: u64,
    /// Callers currently parked waiting for a slot.
    pub waiting: usize,
}

struct Slots<B, M, const N: usize> {
    base: VirtualAddress,
    state: [SlotState; N],
    /// Next slot the scan looks at.
    cursor: usize,
    mapper: B,
    frames: M,
    flushes: u64,
}

type SlotsGuard<'a, B, M, const N: usize> = MutexGuard<'a, Slots<B, M, N>, RawSpin>;

#[inline]
const fn slot_address(base: VirtualAddress, nr: usize) -> VirtualAddress {
    VirtualAddress::new(base.as_u64() + nr as u64 * PAGE_SIZE)
}

impl<B: KernelMapper, M: FrameAddressMap, const N: usize> Slots<B, M, N> {
    #[allow(clippy::cast_possible_truncation)]
    fn index(&self, va: VirtualAddress) -> usize {
        let nr = (va - self.base) / PAGE_SIZE;
        debug_assert!(nr < N as u64, "{va} escaped the kmap window");
        nr as usize
    }

    /// Take another reference on the slot `frame` is already bound to.
    fn get_existing(&mut self, frame: PhysicalPage) -> Option<VirtualAddress> {
        let va = self.frames.get_bound_address(frame)?;
        let nr = self.index(va);
        self.state[nr].get();
        trace!("kmap: {frame} already at slot {nr}, {:?}", self.state[nr]);
        Some(va)
    }

    /// Bind free slot `nr` to `frame` with one holder.
    fn bind(&mut self, nr: usize, frame: PhysicalPage) -> VirtualAddress {
        let va = slot_address(self.base, nr);
        self.mapper.commit_mapping(va, frame);
        self.state[nr].bind(frame);
        self.frames.set_bound_address(frame, Some(va));
        trace!("kmap: bound {frame} to slot {nr} at {va}");
        va
    }

    /// Unmap every stale slot, then invalidate the whole window once.
    ///
    /// Returns the number of slots that became free.
    fn flush_all_stale(&mut self) -> usize {
        let mut reclaimed = 0;
        for nr in 0..N {
            let Some(frame) = self.state[nr].reclaim() else {
                continue;
            };
            let va = slot_address(self.base, nr);

            // Nobody can reach the PTE without the lock we hold.
            let cleared = self.mapper.clear_mapping(va);
            assert_eq!(cleared, Some(frame), "stale kmap slot {nr} lost its mapping");

            self.frames.set_bound_address(frame, None);
            reclaimed += 1;
        }

        self.mapper
            .invalidate_range(self.base, slot_address(self.base, N));
        self.flushes += 1;
        debug!("kmap: invalidated window, reclaimed {reclaimed} stale slots");
        reclaimed
    }
}

/// The bounded permanent-kmap allocator.
///
/// - `B` programs the window's page table and invalidates the TLB.
/// - `M` stores each frame's reverse pointer.
/// - `N` is the number of slots (at most one page table's worth).
pub struct Pkmap<B, M, const N: usize> {
    base: VirtualAddress,
    slots: SpinMutex<Slots<B, M, N>>,
    waiters: WaitQueue,
}

impl<F: TlbFlush, const N: usize> Pkmap<PkmapPageTable<F>, PageAddressTable<N>, N> {
    /// Allocator over a fresh [`PkmapPageTable`] and a hashed reverse-pointer table.
    ///
    /// # Errors
    /// The window base is not aligned to a full page table.
    pub fn with_flush(config: PkmapConfig, flush: F) -> Result<Self, VmemError> {
        let table = PkmapPageTable::new(config.base, flush)?;
        Ok(Self::new(config, table, PageAddressTable::new()))
    }
}

impl<B: KernelMapper, M: FrameAddressMap, const N: usize> Pkmap<B, M, N> {
    /// Create an allocator with every slot free.
    ///
    /// `mapper` must cover the window described by `config`.
    ///
    /// # Panics
    /// `config.base` is not page aligned.
    pub fn new(config: PkmapConfig, mapper: B, frames: M) -> Self {
        const { assert!(N > 0 && N <= PT_ENTRIES, "kmap window must fit one page table") };
        assert!(
            config.base.is_page_aligned(),
            "kmap window base {} is not page aligned",
            config.base
        );

        Self {
            base: config.base,
            slots: SpinMutex::new(Slots {
                base: config.base,
                state: [SlotState::Free; N],
                cursor: 0,
                mapper,
                frames,
                flushes: 0,
            }),
            waiters: WaitQueue::new(),
        }
    }

    /// Map `frame` into the window and return its address.
    ///
    /// If `frame` is already bound (held or stale), its slot gains a holder and
    /// the same address is returned. Otherwise a free slot is bound, running an
    /// invalidation pass whenever the scan wraps around. If no slot can be
    /// found, the caller sleeps until a [`release`](Self::release) and retries.
    ///
    /// Blocks forever if all slots stay held.
    pub fn acquire(&self, frame: PhysicalPage) -> VirtualAddress {
        let mut slots = self.slots.lock();
        loop {
            // Someone may have bound this very frame while we slept.
            if let Some(va) = slots.get_existing(frame) {
                return va;
            }

            if let Some(va) = self.map_new_virtual(&mut slots, frame) {
                return va;
            }

            debug!("kmap: all {N} slots busy, {frame} waits");
            slots = self.waiters.wait(slots);
            debug!("kmap: {frame} woke up, retrying");
        }
    }

    /// Scan for a free slot starting at the cursor.
    ///
    /// Looking at slot 0 first runs an invalidation pass, after which the scan
    /// gets a fresh budget of `N` slots. Returns `None` once the budget runs
    /// out, which happens right before the cursor reaches slot 0 again.
    fn map_new_virtual(
        &self,
        slots: &mut SlotsGuard<'_, B, M, N>,
        frame: PhysicalPage,
    ) -> Option<VirtualAddress> {
        let mut budget = N;
        loop {
            let nr = slots.cursor;
            slots.cursor = (nr + 1) % N;

            if nr == 0 {
                // we take one reclaimed slot ourselves, pass any surplus on
                if slots.flush_all_stale() > 1 {
                    self.waiters.notify_one(&*slots);
                }
                budget = N;
            }

            if slots.state[nr].is_free() {
                return Some(slots.bind(nr, frame));
            }

            budget -= 1;
            if budget == 0 {
                return None;
            }
        }
    }

    /// Drop one reference on the slot at `address`.
    ///
    /// # Panics
    /// `address` is not a currently held slot address; see [`try_release`](Self::try_release).
    pub fn release(&self, address: VirtualAddress) {
        if let Err(err) = self.try_release(address) {
            panic!("kunmap: {err}");
        }
    }

    /// Checked [`release`](Self::release).
    ///
    /// When the last holder leaves, the slot turns stale (not free: the TLB
    /// may still cache it) and one waiter is woken.
    ///
    /// # Errors
    /// `address` is outside the window, not slot aligned, or names a slot that
    /// is not held. The table is left unchanged.
    pub fn try_release(&self, address: VirtualAddress) -> Result<(), KmapError> {
        let nr = self.slot_of(address)?;
        let mut slots = self.slots.lock();

        let now_stale = slots.state[nr]
            .put()
            .map_err(|state| KmapError::NotHeld { address, state })?;

        if now_stale {
            trace!("kmap: slot {nr} at {address} is stale");
            self.waiters.notify_one(&slots);
        }
        Ok(())
    }

    /// [`acquire`](Self::acquire) with a guard that releases on drop.
    pub fn map(&self, frame: PhysicalPage) -> PkmapGuard<'_, B, M, N> {
        PkmapGuard {
            address: self.acquire(frame),
            pkmap: self,
        }
    }

    /// The slot address `frame` is bound to (held or stale), if any.
    pub fn page_address(&self, frame: PhysicalPage) -> Option<VirtualAddress> {
        self.slots.lock().frames.get_bound_address(frame)
    }

    /// Slot number of a slot address.
    ///
    /// # Errors
    /// `address` is outside the window or not page aligned.
    #[allow(clippy::cast_possible_truncation)]
    pub fn slot_of(&self, address: VirtualAddress) -> Result<usize, KmapError> {
        match address.pages_since(self.base) {
            Some(nr) if nr < N as u64 => {
                if address.is_page_aligned() {
                    Ok(nr as usize)
                } else {
                    Err(KmapError::Unaligned(address))
                }
            }
            _ => Err(KmapError::OutsideWindow(address)),
        }
    }

    /// Address of slot `nr`.
    ///
    /// # Panics
    /// `nr >= N`.
    #[must_use]
    pub fn slot_address(&self, nr: usize) -> VirtualAddress {
        assert!(nr < N, "kmap slot {nr} out of range");
        slot_address(self.base, nr)
    }

    /// Current state of slot `nr`.
    ///
    /// # Panics
    /// `nr >= N`.
    #[must_use]
    pub fn slot_state(&self, nr: usize) -> SlotState {
        self.slots.lock().state[nr]
    }

    /// `[start, end)` of the slot window.
    #[must_use]
    pub const fn window(&self) -> (VirtualAddress, VirtualAddress) {
        (self.base, slot_address(self.base, N))
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn contains(&self, address: VirtualAddress) -> bool {
        let (start, end) = self.window();
        start <= address && address < end
    }

    #[must_use]
    pub fn stats(&self) -> PkmapStats {
        let slots = self.slots.lock();
        let mut stats = PkmapStats {
            flushes: slots.flushes,
            waiting: self.waiters.waiters(),
            ..PkmapStats::default()
        };
        for state in &slots.state {
            match *state {
                SlotState::Free => stats.free += 1,
                SlotState::Stale(_) => stats.stale += 1,
                SlotState::Held { holders, .. } => {
                    stats.held += 1;
                    stats.holders += holders.get();
                }
            }
        }
        stats
    }

    /// Run `f` against the page-table backend under the lock.
    pub fn with_mapper<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        f(&self.slots.lock().mapper)
    }

    /// Check the slot table against the page table and the reverse pointers.
    ///
    /// - a free slot has no PTE,
    /// - a stale or held slot's PTE maps its frame, and that frame's reverse
    ///   pointer names the slot (so no frame is bound twice),
    /// - no reverse pointer exists beyond those.
    ///
    /// # Panics
    /// On the first violation.
    pub fn check_invariants(&self) {
        let slots = self.slots.lock();
        let mut bound = 0;
        for (nr, state) in slots.state.iter().enumerate() {
            let va = slot_address(slots.base, nr);
            let mapped = slots.mapper.lookup(va);
            match state.frame() {
                None => assert_eq!(mapped, None, "free kmap slot {nr} is still mapped"),
                Some(frame) => {
                    bound += 1;
                    assert_eq!(mapped, Some(frame), "kmap slot {nr} does not map {frame}");
                    assert_eq!(
                        slots.frames.get_bound_address(frame),
                        Some(va),
                        "reverse pointer of {frame} does not name slot {nr}"
                    );
                }
            }
        }
        assert_eq!(
            slots.frames.len(),
            bound,
            "reverse pointers outlive their slots"
        );
    }
}

/// A mapped frame; releases its slot when dropped.
pub struct PkmapGuard<'a, B: KernelMapper, M: FrameAddressMap, const N: usize> {
    pkmap: &'a Pkmap<B, M, N>,
    address: VirtualAddress,
}

impl<B: KernelMapper, M: FrameAddressMap, const N: usize> PkmapGuard<'_, B, M, N> {
    #[must_use]
    pub const fn address(&self) -> VirtualAddress {
        self.address
    }

    #[must_use]
    pub const fn as_ptr<T>(&self) -> *const T {
        self.address.as_ptr()
    }

    #[must_use]
    pub const fn as_mut_ptr<T>(&self) -> *mut T {
        self.address.as_mut_ptr()
    }
}

impl<B: KernelMapper, M: FrameAddressMap, const N: usize> Drop for PkmapGuard<'_, B, M, N> {
    fn drop(&mut self) {
        self.pkmap.release(self.address);
    }
}
