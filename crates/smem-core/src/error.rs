//! Catalog validation errors.

use std::error::Error;
use std::fmt;

use crate::id::RegionId;

/// Errors detected while building a [`Catalog`](crate::Catalog).
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogError {
    /// Two resources share a name.
    DuplicateResource {
        /// The repeated name.
        name: String,
    },
    /// Two scenarios share a name.
    DuplicateScenario {
        /// The repeated name.
        name: String,
    },
    /// A resource weight is outside `0..=100`.
    WeightOutOfRange {
        /// The offending resource.
        resource: String,
        /// The configured weight.
        weight: u32,
    },
    /// A requirement size is NaN, infinite, zero, or negative.
    InvalidSize {
        /// The offending resource.
        resource: String,
        /// The configured size in MiB.
        mib: f64,
    },
    /// A requirement lists sizes but no candidate region.
    EmptyRegionSet {
        /// The offending resource.
        resource: String,
        /// Position of the requirement within the resource.
        requirement: usize,
    },
    /// A scenario names a resource that is not in the catalog.
    UnknownResource {
        /// The referencing scenario.
        scenario: String,
        /// The unresolved resource name.
        resource: String,
    },
    /// A scenario lists the same resource twice.
    RepeatedResource {
        /// The referencing scenario.
        scenario: String,
        /// The repeated resource name.
        resource: String,
    },
    /// A requirement names a region the allocator does not manage.
    UnknownRegion {
        /// The offending resource.
        resource: String,
        /// The region that is not configured.
        region: RegionId,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateResource { name } => write!(f, "duplicate resource '{name}'"),
            Self::DuplicateScenario { name } => write!(f, "duplicate scenario '{name}'"),
            Self::WeightOutOfRange { resource, weight } => {
                write!(f, "resource '{resource}' weight {weight} is outside 0..=100")
            }
            Self::InvalidSize { resource, mib } => {
                write!(f, "resource '{resource}' has invalid size {mib} MiB")
            }
            Self::EmptyRegionSet {
                resource,
                requirement,
            } => {
                write!(
                    f,
                    "resource '{resource}' requirement {requirement} has sizes but no region"
                )
            }
            Self::UnknownResource { scenario, resource } => {
                write!(f, "scenario '{scenario}' references unknown resource '{resource}'")
            }
            Self::RepeatedResource { scenario, resource } => {
                write!(f, "scenario '{scenario}' lists resource '{resource}' twice")
            }
            Self::UnknownRegion { resource, region } => {
                write!(f, "resource '{resource}' references unknown region {region}")
            }
        }
    }
}

impl Error for CatalogError {}
