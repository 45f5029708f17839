//! # Frame reverse pointers
//!
//! Frames without a permanent virtual address remember which kmap slot
//! currently represents them, so a second `acquire` of the same frame finds
//! its slot without scanning. [`FrameAddressMap`] is that association;
//! [`PageAddressTable`] is a fixed-capacity hashed implementation for frames
//! whose metadata has no room for the pointer.

use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

/// Frame → bound kmap address.
///
/// Accessed only under the kmap lock.
pub trait FrameAddressMap {
    /// The address `frame` is currently bound to, if any.
    fn get_bound_address(&self, frame: PhysicalPage) -> Option<VirtualAddress>;

    /// Set or clear the address `frame` is bound to.
    fn set_bound_address(&mut self, frame: PhysicalPage, address: Option<VirtualAddress>);

    /// Number of frames that currently have an address.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Open-addressing hash table with room for `N` frames.
///
/// Linear probing with backward-shift deletion, so lookups never have to step
/// over tombstones. `N` is the number of kmap slots: every stale or held slot
/// contributes exactly one entry, and no other entries exist.
pub struct PageAddressTable<const N: usize> {
    entries: [Option<(PhysicalPage, VirtualAddress)>; N],
    len: usize,
}

impl<const N: usize> Default for PageAddressTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PageAddressTable<N> {
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0, "page address table needs capacity") };
        Self {
            entries: [None; N],
            len: 0,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Fibonacci hashing of the frame number.
    #[allow(clippy::cast_possible_truncation)]
    const fn home(frame: PhysicalPage) -> usize {
        let h = frame.number().wrapping_mul(0x9E37_79B9_7F4A_7C15);
        ((h >> 32) as usize) % N
    }

    fn find(&self, frame: PhysicalPage) -> Option<usize> {
        let mut i = Self::home(frame);
        for _ in 0..N {
            match self.entries[i] {
                None => return None,
                Some((f, _)) if f == frame => return Some(i),
                Some(_) => i = (i + 1) % N,
            }
        }
        None
    }

    fn insert(&mut self, frame: PhysicalPage, address: VirtualAddress) {
        let mut i = Self::home(frame);
        for _ in 0..N {
            match self.entries[i] {
                Some((f, _)) if f == frame => {
                    self.entries[i] = Some((frame, address));
                    return;
                }
                Some(_) => i = (i + 1) % N,
                None => {
                    self.entries[i] = Some((frame, address));
                    self.len += 1;
                    return;
                }
            }
        }
        panic!("page address table full ({N} entries) while binding {frame}");
    }

    fn remove(&mut self, frame: PhysicalPage) {
        let Some(mut hole) = self.find(frame) else {
            return;
        };
        self.entries[hole] = None;
        self.len -= 1;

        // Pull later members of the probe cluster back into the hole when
        // their home position does not lie cyclically in (hole, j].
        let mut j = hole;
        loop {
            j = (j + 1) % N;
            let Some((f, _)) = self.entries[j] else {
                break;
            };
            let ideal = Self::home(f);
            let stays = if hole <= j {
                hole < ideal && ideal <= j
            } else {
                hole < ideal || ideal <= j
            };
            if !stays {
                self.entries[hole] = self.entries[j].take();
                hole = j;
            }
        }
    }
}

impl<const N: usize> FrameAddressMap for PageAddressTable<N> {
    fn get_bound_address(&self, frame: PhysicalPage) -> Option<VirtualAddress> {
        self.find(frame).and_then(|i| self.entries[i]).map(|(_, va)| va)
    }

    fn set_bound_address(&mut self, frame: PhysicalPage, address: Option<VirtualAddress>) {
        match address {
            Some(va) => self.insert(frame, va),
            None => self.remove(frame),
        }
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn va(nr: u64) -> VirtualAddress {
        VirtualAddress::new(0xffff_fe00_0000_0000 + nr * 4096)
    }

    fn frame(nr: u64) -> PhysicalPage {
        PhysicalPage::from_number(0x10_0000 + nr)
    }

    #[test]
    fn set_get_clear() {
        let mut t = PageAddressTable::<8>::new();
        assert!(t.is_empty());

        t.set_bound_address(frame(1), Some(va(3)));
        assert_eq!(t.get_bound_address(frame(1)), Some(va(3)));
        assert_eq!(t.get_bound_address(frame(2)), None);
        assert_eq!(t.len(), 1);

        // rebinding overwrites instead of duplicating
        t.set_bound_address(frame(1), Some(va(4)));
        assert_eq!(t.get_bound_address(frame(1)), Some(va(4)));
        assert_eq!(t.len(), 1);

        t.set_bound_address(frame(1), None);
        assert_eq!(t.get_bound_address(frame(1)), None);
        assert!(t.is_empty());

        // clearing an absent frame is a no-op
        t.set_bound_address(frame(1), None);
        assert!(t.is_empty());
    }

    #[test]
    fn fills_to_capacity_and_survives_churn() {
        const N: usize = 16;
        let mut t = PageAddressTable::<N>::new();

        for i in 0..N as u64 {
            t.set_bound_address(frame(i * 7), Some(va(i)));
        }
        assert_eq!(t.len(), N);

        // remove every other entry, then check the rest is still reachable
        for i in (0..N as u64).step_by(2) {
            t.set_bound_address(frame(i * 7), None);
        }
        for i in 0..N as u64 {
            let expected = (i % 2 == 1).then(|| va(i));
            assert_eq!(t.get_bound_address(frame(i * 7)), expected, "frame {i}");
        }

        // refill with different frames
        for i in 0..(N / 2) as u64 {
            t.set_bound_address(frame(1000 + i), Some(va(100 + i)));
        }
        assert_eq!(t.len(), N);
        for i in 0..(N / 2) as u64 {
            assert_eq!(t.get_bound_address(frame(1000 + i)), Some(va(100 + i)));
        }
    }

    #[test]
    fn colliding_frames_stay_reachable_after_removal() {
        // four entries in four buckets: probe clusters are bound to overlap
        let mut t = PageAddressTable::<4>::new();
        for i in 0..4 {
            t.set_bound_address(frame(i), Some(va(i)));
        }
        t.set_bound_address(frame(0), None);
        t.set_bound_address(frame(2), None);
        assert_eq!(t.get_bound_address(frame(1)), Some(va(1)));
        assert_eq!(t.get_bound_address(frame(3)), Some(va(3)));
        assert_eq!(t.len(), 2);
    }

    #[test]
    #[should_panic(expected = "page address table full")]
    fn overflow_panics() {
        let mut t = PageAddressTable::<2>::new();
        t.set_bound_address(frame(0), Some(va(0)));
        t.set_bound_address(frame(1), Some(va(1)));
        t.set_bound_address(frame(2), Some(va(2)));
    }
}
