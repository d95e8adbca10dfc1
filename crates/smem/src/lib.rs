//! smem: a shared-memory region arbiter.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all smem sub-crates. For most users, adding `smem` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use smem::prelude::*;
//!
//! let a = RegionId(0);
//! let sim = SimAllocator::new(
//!     &AllocatorConfig::default(),
//!     &[RegionInfo::new(a, 0x1000_0000, 16 * MIB)],
//! )
//! .unwrap();
//!
//! let catalog = Catalog::builder()
//!     .resource("DECODER", 0, 60, 0, &[(&[a], &[4.0, 1.0])])
//!     .resource("DISPLAY", 1, 100, 0, &[(&[a], &[2.0])])
//!     .scenario("PLAYBACK", 0, &["DECODER", "DISPLAY"])
//!     .build()
//!     .unwrap();
//!
//! let mut engine = ScenarioEngine::new(Arc::new(catalog), sim, EngineConfig::default()).unwrap();
//! let playback = engine.scenario_by_name("PLAYBACK").unwrap();
//! engine.scenario_start(playback).unwrap();
//! assert_eq!(engine.allocator().occupied_bytes(a), 7 * MIB);
//!
//! engine.scenario_stop(playback).unwrap();
//! assert!(engine.allocator().ledger().is_clear());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `smem-core` | IDs, flags, region geometry, the catalog |
//! | [`alloc`] | `smem-alloc` | Chunk ledger, simulation and device backends |
//! | [`engine`] | `smem-engine` | Resource manager and scenario engine |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the catalog (`smem-core`).
pub use smem_core as types;

/// Chunk-granular allocation (`smem-alloc`).
///
/// [`alloc::SimAllocator`] places allocations itself;
/// [`alloc::HwAllocator`] asks a driver through an [`alloc::SmemDevice`]
/// and mirrors every grant in its ledger.
pub use smem_alloc as alloc;

/// Scenario arbitration (`smem-engine`).
pub use smem_engine as engine;

/// Common imports for typical smem usage.
pub mod prelude {
    // Core types
    pub use smem_core::{
        AllocFlags, Catalog, Handle, RegionId, RegionInfo, RegionSet, ResourceId, ScenarioId, MIB,
    };

    // Allocation
    pub use smem_alloc::{
        AllocError, AllocRequest, AllocatorConfig, DebugfsDevice, DeviceConfig, HwAllocator,
        RegionAllocator, SimAllocator, SmemDevice,
    };

    // Engine
    pub use smem_engine::{EngineConfig, EngineError, EvictionPolicy, ScenarioEngine};
}
