//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a memory region by its hardware index.
///
/// The index doubles as the bit position in the region bitmask sent to
/// the control device. Regions with an index below 26 are displayed by
/// letter (`RegionId(0)` is `A`), matching how the board documentation
/// names them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u8);

impl RegionId {
    /// Highest index representable in a 64-bit region bitmask.
    pub const MAX_INDEX: u8 = 63;

    /// The bit this region occupies in a candidate bitmask.
    pub fn mask_bit(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 26 {
            write!(f, "{}", (b'A' + self.0) as char)
        } else {
            write!(f, "R{}", self.0)
        }
    }
}

impl From<u8> for RegionId {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

/// Index of a resource definition within a [`Catalog`](crate::Catalog).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a scenario definition within a [`Catalog`](crate::Catalog).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioId(pub u32);

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Weight-budget class of a resource.
///
/// Resources concurrently allocated in the same group may not exceed the
/// engine's weight budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceGroup(pub u32);

impl fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutual-exclusion class of a scenario.
///
/// A separate namespace from [`ResourceGroup`]: at most one scenario per
/// scenario group may be running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioGroup(pub u32);

impl fmt::Display for ScenarioGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of one live allocation.
///
/// Issued from a per-allocator monotonic counter starting at 1 and never
/// reused, so a retired handle can always be told apart from a live one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct Handle(pub u64);

impl Handle {
    /// The first handle an allocator issues.
    pub const FIRST: Handle = Handle(1);

    /// The handle issued after this one.
    pub fn next(self) -> Handle {
        Handle(self.0 + 1)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
