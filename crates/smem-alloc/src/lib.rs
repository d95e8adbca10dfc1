//! Chunk-granular, multi-region allocation for the smem arbiter.
//!
//! Every region is partitioned into fixed-size chunks tracked by a
//! [`ChunkLedger`]. Allocations occupy whole contiguous chunk runs inside a
//! single region and are addressed by never-reused [`Handle`]s recorded in
//! an [`AllocationTable`].
//!
//! # Architecture
//!
//! ```text
//! RegionAllocator (capability trait)
//! ├── SimAllocator          first-fit placement, in memory
//! └── HwAllocator<D>        placement delegated to a SmemDevice
//!     └── DebugfsDevice     regioninfo / alloc / free control files
//!
//! both own:
//! ├── ChunkLedger           RegionId → RegionLedger (Free | Occupied(handle) per chunk)
//! └── AllocationTable       Handle → AllocationRecord (span + owner metadata)
//! ```
//!
//! The ledger is the invariant checker for both backends: a chunk is never
//! claimed by two live handles, and a free must find every chunk of its
//! span still owned by the handle being released.
//!
//! [`Handle`]: smem_core::Handle

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod device;
pub mod error;
pub mod handle;
pub mod hw;
pub mod ledger;
pub mod protocol;
pub mod sim;

// Public re-exports for the primary API surface.
pub use allocator::{AllocRequest, OccupiedRun, RegionAllocator, RegionOccupancy};
pub use config::{AllocatorConfig, ConfigError, DeviceConfig};
pub use device::{DebugfsDevice, SmemDevice};
pub use error::AllocError;
pub use handle::{AllocOwner, AllocationRecord, AllocationTable};
pub use hw::HwAllocator;
pub use ledger::{ChunkLedger, ChunkRun, ChunkSpan, ChunkState, RegionLedger};
pub use sim::SimAllocator;
