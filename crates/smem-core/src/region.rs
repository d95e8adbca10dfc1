//! Region geometry and candidate region sets.

use std::fmt;

use smallvec::SmallVec;

use crate::id::RegionId;

/// Physical geometry of one fixed-capacity memory region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionInfo {
    /// Hardware index of the region.
    pub id: RegionId,
    /// Base address of the region.
    pub base: u64,
    /// Capacity of the region in bytes.
    pub size: u64,
}

impl RegionInfo {
    /// Create a region descriptor.
    pub fn new(id: RegionId, base: u64, size: u64) -> Self {
        Self { id, base, size }
    }

    /// One past the last address of the region.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    /// Whether `[addr, addr + len)` lies entirely inside this region.
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        match addr.checked_add(len) {
            Some(stop) => addr >= self.base && stop <= self.end(),
            None => false,
        }
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region {} [{:#x}..{:#x}) {:#x} bytes",
            self.id,
            self.base,
            self.end(),
            self.size
        )
    }
}

/// Ordered set of candidate regions for one allocation.
///
/// Order matters: the allocator tries candidates front to back. Most
/// requirements name one or two regions, so the set lives inline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegionSet(SmallVec<[RegionId; 4]>);

impl RegionSet {
    /// An empty set.
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// Append a region unless it is already present.
    pub fn insert(&mut self, id: RegionId) {
        if !self.0.contains(&id) {
            self.0.push(id);
        }
    }

    /// Whether the set names `id`.
    pub fn contains(&self, id: RegionId) -> bool {
        self.0.contains(&id)
    }

    /// Number of candidate regions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate candidates in preference order.
    pub fn iter(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.0.iter().copied()
    }

    /// Candidates as a slice, in preference order.
    pub fn as_slice(&self) -> &[RegionId] {
        &self.0
    }

    /// Bitmask with bit *i* set iff region *i* is a candidate.
    pub fn mask(&self) -> u64 {
        self.0.iter().fold(0, |mask, id| mask | id.mask_bit())
    }

    /// Decode a bitmask into a set ordered by ascending index.
    pub fn from_mask(mask: u64) -> Self {
        (0..=RegionId::MAX_INDEX)
            .filter(|i| mask & (1u64 << i) != 0)
            .map(RegionId)
            .collect()
    }
}

impl FromIterator<RegionId> for RegionSet {
    fn from_iter<I: IntoIterator<Item = RegionId>>(iter: I) -> Self {
        let mut set = RegionSet::empty();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl From<&[RegionId]> for RegionSet {
    fn from(ids: &[RegionId]) -> Self {
        ids.iter().copied().collect()
    }
}

impl fmt::Display for RegionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}
