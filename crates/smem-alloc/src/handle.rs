//! Allocation handles and the live-allocation table.
//!
//! A [`Handle`] is issued from a per-table monotonic counter and never
//! reused. The [`AllocationTable`] maps each live handle to the chunk span
//! it occupies plus the metadata of the request that created it.

use std::fmt;

use indexmap::IndexMap;
use smem_core::{AllocFlags, Handle, RegionSet};

use crate::ledger::ChunkSpan;

/// Metadata of the request behind a live allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocOwner {
    /// Free-form description, normally the resource name.
    pub description: String,
    /// Bytes requested (before rounding up to whole chunks).
    pub requested: u64,
    /// Requested alignment (0 means unit alignment).
    pub alignment: u64,
    /// Flags passed with the request.
    pub flags: AllocFlags,
    /// Candidate regions the request named.
    pub candidates: RegionSet,
}

impl fmt::Display for AllocOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:#x} bytes, flags {}, [{}])",
            self.description, self.requested, self.flags, self.candidates
        )
    }
}

/// One live allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationRecord {
    /// The handle returned to the caller.
    pub handle: Handle,
    /// Chunks occupied in the ledger.
    pub span: ChunkSpan,
    /// Absolute address of the first chunk.
    pub addr: u64,
    /// Request metadata.
    pub owner: AllocOwner,
}

/// Live allocations keyed by handle, in allocation order.
#[derive(Clone, Debug)]
pub struct AllocationTable {
    next: Handle,
    live: IndexMap<Handle, AllocationRecord>,
}

impl AllocationTable {
    /// An empty table whose first handle is [`Handle::FIRST`].
    pub fn new() -> Self {
        Self {
            next: Handle::FIRST,
            live: IndexMap::new(),
        }
    }

    /// Reserve the next handle. The counter advances even if the
    /// allocation later fails, so handles are never reused.
    pub fn issue(&mut self) -> Handle {
        let h = self.next;
        self.next = h.next();
        h
    }

    /// Record a live allocation.
    pub fn insert(&mut self, record: AllocationRecord) {
        self.live.insert(record.handle, record);
    }

    /// Retire a handle, returning its record.
    pub fn remove(&mut self, handle: Handle) -> Option<AllocationRecord> {
        // shift_remove keeps the remaining handles in allocation order.
        self.live.shift_remove(&handle)
    }

    /// Look up a live handle.
    pub fn get(&self, handle: Handle) -> Option<&AllocationRecord> {
        self.live.get(&handle)
    }

    /// Live handles in allocation order.
    pub fn handles(&self) -> Vec<Handle> {
        self.live.keys().copied().collect()
    }

    /// Live records in allocation order.
    pub fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.live.values()
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no allocation is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl Default for AllocationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smem_core::RegionId;

    fn record(handle: Handle, start: usize) -> AllocationRecord {
        AllocationRecord {
            handle,
            span: ChunkSpan {
                region: RegionId(0),
                start,
                count: 1,
            },
            addr: start as u64 * 0x8_0000,
            owner: AllocOwner {
                description: "VDEC".into(),
                requested: 0x8_0000,
                alignment: 0,
                flags: AllocFlags::HEAP_DEFAULT,
                candidates: RegionSet::from_mask(0b1),
            },
        }
    }

    #[test]
    fn issued_handles_never_repeat() {
        let mut t = AllocationTable::new();
        let a = t.issue();
        let b = t.issue();
        assert_eq!(a, Handle::FIRST);
        assert_eq!(b, Handle(2));
        t.insert(record(a, 0));
        t.remove(a);
        assert_eq!(t.issue(), Handle(3));
    }

    #[test]
    fn handles_stay_in_allocation_order() {
        let mut t = AllocationTable::new();
        for i in 0..4 {
            let h = t.issue();
            t.insert(record(h, i));
        }
        t.remove(Handle(2));
        assert_eq!(t.handles(), vec![Handle(1), Handle(3), Handle(4)]);
        assert_eq!(t.len(), 3);
        assert!(t.get(Handle(2)).is_none());
        assert_eq!(t.get(Handle(3)).map(|r| r.span.start), Some(2));
    }
}
