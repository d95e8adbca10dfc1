//! Scenario arbitration for the smem shared-memory arbiter.
//!
//! Scenarios (use-cases) claim resources (functional blocks); resources
//! claim memory from a [`RegionAllocator`]. The engine decides which
//! resources are allocated, which are reassigned to a starting scenario,
//! and which are freed when scenarios conflict or a resource group runs
//! over its weight budget.
//!
//! # Layers
//!
//! ```text
//! ScenarioEngine<A>     running set, hold, group exclusion, failed-start rollback
//! └── ResourceManager<A>   weight budget + eviction, per-size alloc, rollback
//!     ├── OwnershipRegistry   ResourceId → (owner, handles), allocation order
//!     └── A: RegionAllocator  SimAllocator or HwAllocator<D>
//! ```
//!
//! Everything is single-threaded and synchronous: each call runs to
//! completion and all mutation goes through `&mut self`.
//!
//! [`RegionAllocator`]: smem_alloc::RegionAllocator

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod resource;
pub mod scenario;

pub use config::{ConfigError, EngineConfig, EvictionPolicy};
pub use error::EngineError;
pub use metrics::EngineMetrics;
pub use registry::{HandleList, Ownership, OwnershipRegistry};
pub use resource::ResourceManager;
pub use scenario::ScenarioEngine;
