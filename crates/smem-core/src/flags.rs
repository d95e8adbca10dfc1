//! Allocation flags forwarded to the control device.
//!
//! The low byte selects the heap type, bits 8–15 a placement hint. The
//! simulation backend carries flags as metadata only.

use std::fmt;
use std::ops::BitOr;

/// Bitmask of allocation flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AllocFlags(pub u32);

impl AllocFlags {
    /// Default heap, no placement preference.
    pub const HEAP_DEFAULT: AllocFlags = AllocFlags(0x00);
    /// Shared with the system heap.
    pub const SHARED_SYSTEM: AllocFlags = AllocFlags(0x01);
    /// Dynamic carveout.
    pub const CARVEOUT_DYNAMIC: AllocFlags = AllocFlags(0x02);
    /// Static carveout.
    pub const CARVEOUT_STATIC: AllocFlags = AllocFlags(0x04);

    /// No placement preference.
    pub const POS_DEFAULT: AllocFlags = AllocFlags(0x0000);
    /// Place near the top of the region.
    pub const POS_TOP: AllocFlags = AllocFlags(0x0100);
    /// Place near the middle of the region.
    pub const POS_MID: AllocFlags = AllocFlags(0x0200);
    /// Place near the bottom of the region.
    pub const POS_BOTTOM: AllocFlags = AllocFlags(0x0400);

    const HEAP_MASK: u32 = 0x00ff;
    const POS_MASK: u32 = 0xff00;

    /// Raw bit value.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Heap-type portion of the flags.
    pub fn heap_type(self) -> AllocFlags {
        AllocFlags(self.0 & Self::HEAP_MASK)
    }

    /// Placement-hint portion of the flags.
    pub fn position(self) -> AllocFlags {
        AllocFlags(self.0 & Self::POS_MASK)
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: AllocFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AllocFlags {
    type Output = AllocFlags;

    fn bitor(self, rhs: AllocFlags) -> AllocFlags {
        AllocFlags(self.0 | rhs.0)
    }
}

impl From<u32> for AllocFlags {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl fmt::Display for AllocFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
