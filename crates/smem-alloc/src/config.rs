//! Allocator and device configuration.

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use smem_core::{RegionId, RegionInfo};

/// Configuration for the chunk ledger.
///
/// All regions share one chunk unit of `0x1000 << unit_order` bytes.
/// Validated when a ledger is built; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Power-of-two exponent applied to the 4 KiB page size.
    ///
    /// Default: 7 (512 KiB chunks). Must not exceed
    /// [`MAX_UNIT_ORDER`](Self::MAX_UNIT_ORDER).
    pub unit_order: u32,
}

impl AllocatorConfig {
    /// Smallest chunk unit, one page.
    pub const PAGE_SIZE: u64 = 0x1000;

    /// Default unit order (512 KiB chunks).
    pub const DEFAULT_UNIT_ORDER: u32 = 7;

    /// Largest supported unit order (4 GiB chunks).
    pub const MAX_UNIT_ORDER: u32 = 20;

    /// Create a config with the given unit order.
    pub fn new(unit_order: u32) -> Self {
        Self { unit_order }
    }

    /// Chunk unit size in bytes.
    pub fn unit_bytes(&self) -> u64 {
        Self::PAGE_SIZE << self.unit_order.min(Self::MAX_UNIT_ORDER)
    }

    /// Check the config and the region geometry it will be applied to.
    pub fn validate(&self, regions: &[RegionInfo]) -> Result<(), ConfigError> {
        if self.unit_order > Self::MAX_UNIT_ORDER {
            return Err(ConfigError::UnitOrderOutOfRange {
                order: self.unit_order,
            });
        }
        if regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        let unit = self.unit_bytes();
        for (i, r) in regions.iter().enumerate() {
            if r.id.0 > RegionId::MAX_INDEX {
                return Err(ConfigError::RegionIndexOutOfRange { region: r.id });
            }
            if r.size == 0 {
                return Err(ConfigError::EmptyRegion { region: r.id });
            }
            if r.size % unit != 0 {
                return Err(ConfigError::CapacityNotChunkMultiple {
                    region: r.id,
                    size: r.size,
                    unit,
                });
            }
            if r.base.checked_add(r.size).is_none() {
                return Err(ConfigError::AddressOverflow { region: r.id });
            }
            for other in &regions[i + 1..] {
                if other.id == r.id {
                    return Err(ConfigError::DuplicateRegion { region: r.id });
                }
                if other.base < r.end() && r.base < other.end() {
                    return Err(ConfigError::OverlappingRegions {
                        first: r.id,
                        second: other.id,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_UNIT_ORDER)
    }
}

/// Location of the control files exposed by the device driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Directory holding the `regioninfo`, `alloc` and `free` files.
    pub root: PathBuf,
}

impl DeviceConfig {
    /// Default debugfs directory of the test driver.
    pub const DEFAULT_ROOT: &'static str = "/sys/kernel/debug/smem-test";

    /// Use control files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the region geometry file.
    pub fn regioninfo_path(&self) -> PathBuf {
        self.root.join("regioninfo")
    }

    /// Path of the allocation request channel.
    pub fn alloc_path(&self) -> PathBuf {
        self.root.join("alloc")
    }

    /// Path of the release request channel.
    pub fn free_path(&self) -> PathBuf {
        self.root.join("free")
    }

    /// The configured root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

/// Errors detected while validating allocator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `unit_order` exceeds [`AllocatorConfig::MAX_UNIT_ORDER`].
    UnitOrderOutOfRange {
        /// The configured order.
        order: u32,
    },
    /// No region was supplied.
    NoRegions,
    /// A region index does not fit the 64-bit candidate bitmask.
    RegionIndexOutOfRange {
        /// The offending region.
        region: RegionId,
    },
    /// A region has zero capacity.
    EmptyRegion {
        /// The offending region.
        region: RegionId,
    },
    /// A region's capacity is not a whole number of chunks.
    CapacityNotChunkMultiple {
        /// The offending region.
        region: RegionId,
        /// Its capacity in bytes.
        size: u64,
        /// The chunk unit in bytes.
        unit: u64,
    },
    /// A region's end address overflows `u64`.
    AddressOverflow {
        /// The offending region.
        region: RegionId,
    },
    /// Two regions share an index.
    DuplicateRegion {
        /// The repeated region.
        region: RegionId,
    },
    /// Two regions cover intersecting address ranges.
    OverlappingRegions {
        /// The earlier region.
        first: RegionId,
        /// The later region.
        second: RegionId,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnitOrderOutOfRange { order } => {
                write!(
                    f,
                    "unit_order {order} exceeds maximum of {}",
                    AllocatorConfig::MAX_UNIT_ORDER
                )
            }
            Self::NoRegions => write!(f, "no regions configured"),
            Self::RegionIndexOutOfRange { region } => {
                write!(f, "region {region} index does not fit a 64-bit mask")
            }
            Self::EmptyRegion { region } => write!(f, "region {region} has zero capacity"),
            Self::CapacityNotChunkMultiple { region, size, unit } => {
                write!(
                    f,
                    "region {region} capacity {size:#x} is not a multiple of unit {unit:#x}"
                )
            }
            Self::AddressOverflow { region } => {
                write!(f, "region {region} end address overflows")
            }
            Self::DuplicateRegion { region } => write!(f, "region {region} configured twice"),
            Self::OverlappingRegions { first, second } => {
                write!(f, "regions {first} and {second} overlap")
            }
        }
    }
}

impl Error for ConfigError {}
