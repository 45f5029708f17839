use crate::SlotState;
use kernel_memory_addresses::VirtualAddress;

/// Misuse of the release path.
///
/// Acquiring never fails; these only flag addresses that could not have come
/// from a matching acquire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KmapError {
    #[error("{0} is outside the kmap window")]
    OutsideWindow(VirtualAddress),
    #[error("{0} is not a slot address")]
    Unaligned(VirtualAddress),
    #[error("kmap slot {address} is not held (state {state:?})")]
    NotHeld {
        address: VirtualAddress,
        state: SlotState,
    },
}
