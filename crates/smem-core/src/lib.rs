//! Core types for the smem shared-memory arbiter.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the allocator and the arbitration engine:
//! typed identifiers, allocation flags, region geometry, and the
//! immutable resource/scenario catalog.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod flags;
pub mod id;
pub mod region;

pub use catalog::{Catalog, CatalogBuilder, Requirement, ResourceDef, ScenarioDef, MAX_WEIGHT, MIB};
pub use error::CatalogError;
pub use flags::AllocFlags;
pub use id::{Handle, RegionId, ResourceGroup, ResourceId, ScenarioGroup, ScenarioId};
pub use region::{RegionInfo, RegionSet};
